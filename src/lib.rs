//! Property registration network.
//!
//! Two contracts share one ledger namespace:
//!
//! * [`contracts::registrar`] approves pending user and property requests.
//! * [`contracts::participant`] lets registered users request accounts,
//!   recharge, list, buy and update properties.
//!
//! Records live in a [`ledger::Ledger`] under composite keys built by
//! [`ledger::KeyScheme`]; callers are identified by an explicit
//! [`identity::Caller`].

pub mod config;
pub mod contracts;
pub mod identity;
pub mod ledger;
pub mod model;

pub use config::NetworkConfig;
pub use contracts::{
    dispatch, submit, ContractError, Decline, Network, Outcome, Transaction, TxContext, TxResult,
};
pub use identity::{Caller, MspRoles, Role};
pub use ledger::{KeyScheme, Ledger, LedgerError, LedgerKey, MemoryLedger};
