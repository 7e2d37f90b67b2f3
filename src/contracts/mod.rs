//! Registrar and participant transactions.
//!
//! Every handler runs against a [`Transaction`] that reads through to the
//! ledger and stages its writes. [`submit`] commits the staged writes as one
//! batch only when the handler returns [`Outcome::Committed`]; declined and
//! failed invocations leave the ledger untouched.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, info_span, warn};

use crate::{
    identity::{Caller, MspRoles, Role},
    ledger::{EntityKind, KeyScheme, Ledger, LedgerError, LedgerKey, WriteSet},
    model::Coins,
};

pub mod dispatch;
pub mod participant;
pub mod registrar;

/// Per-invocation facts supplied by the platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxContext {
    pub tx_id: String,
    pub caller: Caller,
    pub timestamp: DateTime<Utc>,
}

impl TxContext {
    pub fn new(caller: Caller, timestamp: DateTime<Utc>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(caller.msp_id.as_bytes());
        if let Some(id) = &caller.id {
            hasher.update(id.as_bytes());
        }
        hasher.update(timestamp.timestamp_micros().to_le_bytes());
        let digest = hasher.finalize();
        Self {
            tx_id: hex::encode(&digest[..16]),
            caller,
            timestamp,
        }
    }

    pub fn with_tx_id(mut self, tx_id: impl Into<String>) -> Self {
        self.tx_id = tx_id.into();
        self
    }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", content = "result", rename_all = "snake_case")]
pub enum Outcome<T> {
    Committed(T),
    Declined(Decline),
}

impl<T> Outcome<T> {
    pub fn committed(self) -> Option<T> {
        match self {
            Outcome::Committed(value) => Some(value),
            Outcome::Declined(_) => None,
        }
    }

    pub fn declined(&self) -> Option<&Decline> {
        match self {
            Outcome::Committed(_) => None,
            Outcome::Declined(reason) => Some(reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Committed(value) => Outcome::Committed(f(value)),
            Outcome::Declined(reason) => Outcome::Declined(reason),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclineKind {
    InvalidArgument,
    PreconditionFailed,
}

/// A business rule turned the invocation down; nothing was written.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Decline {
    #[error("unknown recharge token {token}")]
    UnknownRechargeToken { token: String },
    #[error("property price must be a positive amount")]
    InvalidPrice,
    #[error("no registration request for property {property_id}")]
    PropertyRequestMissing { property_id: String },
    #[error("{kind} {id} is already approved")]
    AlreadyApproved { kind: EntityKind, id: String },
    #[error("property {property_id} is not for sale")]
    PropertyUnavailable {
        property_id: String,
        status: Option<String>,
    },
    #[error("buyer {name} is not a registered user")]
    BuyerUnknown { name: String },
    #[error("seller {name} of property {property_id} is not a registered user")]
    SellerUnknown { name: String, property_id: String },
    #[error("buyer already owns property {property_id}")]
    AlreadyOwner { property_id: String },
    #[error("balance {balance} does not exceed price {price}")]
    InsufficientFunds { balance: Coins, price: Coins },
    #[error("crediting {amount} would overflow the balance of {name}")]
    BalanceOverflow { name: String, amount: Coins },
    #[error("caller does not own property {property_id}")]
    NotOwner { property_id: String },
}

impl Decline {
    pub fn kind(&self) -> DeclineKind {
        match self {
            Decline::UnknownRechargeToken { .. } | Decline::InvalidPrice => {
                DeclineKind::InvalidArgument
            }
            _ => DeclineKind::PreconditionFailed,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("caller {caller} is not authorized, {required} role required")]
    Unauthorized { required: Role, caller: String },
    #[error("caller {caller} may not act for user {user}")]
    ForeignIdentity { caller: String, user: String },
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },
    #[error("storage failure: {0}")]
    Storage(#[from] LedgerError),
    #[error("record at {key} is malformed: {source}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown transaction function {0}")]
    UnknownFunction(String),
    #[error("{function} takes {expected} arguments, got {actual}")]
    Arity {
        function: String,
        expected: usize,
        actual: usize,
    },
    #[error("invalid argument {name}: {reason}")]
    InvalidArgument { name: &'static str, reason: String },
}

impl ContractError {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        ContractError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Storage failures abort the whole invocation; everything else is a
    /// rejected request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ContractError::Storage(_))
    }
}

pub type TxResult<T> = Result<Outcome<T>, ContractError>;

/// Read-through view of the ledger with staged writes for one invocation.
pub struct Transaction<'a, L: Ledger + ?Sized> {
    ledger: &'a L,
    keys: &'a KeyScheme,
    ctx: &'a TxContext,
    writes: WriteSet,
}

impl<'a, L: Ledger + ?Sized> Transaction<'a, L> {
    pub fn new(ledger: &'a L, keys: &'a KeyScheme, ctx: &'a TxContext) -> Self {
        Self {
            ledger,
            keys,
            ctx,
            writes: WriteSet::new(),
        }
    }

    pub fn keys(&self) -> &KeyScheme {
        self.keys
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.ctx.timestamp
    }

    pub fn require_role(&self, required: Role) -> Result<(), ContractError> {
        if self.ctx.caller.has_role(required) {
            return Ok(());
        }
        Err(ContractError::Unauthorized {
            required,
            caller: self.ctx.caller.to_string(),
        })
    }

    /// Rejects callers whose enrolled identity names a different user.
    pub fn require_identity(&self, name: &str, aadhaar_id: &str) -> Result<(), ContractError> {
        if self.ctx.caller.acts_for(name, aadhaar_id) {
            return Ok(());
        }
        Err(ContractError::ForeignIdentity {
            caller: self.ctx.caller.to_string(),
            user: format!("{name}/{aadhaar_id}"),
        })
    }

    pub fn get_state<T: DeserializeOwned>(
        &self,
        key: &LedgerKey,
    ) -> Result<Option<T>, ContractError> {
        let bytes = match self.writes.get(key) {
            Some(staged) => Some(staged.to_vec()),
            None => self.ledger.get(key)?,
        };
        debug!(%key, found = bytes.is_some(), "get_state");
        bytes
            .map(|bytes| {
                serde_json::from_slice(&bytes).map_err(|source| ContractError::Codec {
                    key: key.to_string(),
                    source,
                })
            })
            .transpose()
    }

    pub fn put_state<T: Serialize>(
        &mut self,
        key: LedgerKey,
        record: &T,
    ) -> Result<(), ContractError> {
        let bytes = serde_json::to_vec(record).map_err(|source| ContractError::Codec {
            key: key.to_string(),
            source,
        })?;
        self.writes.stage(key, bytes);
        Ok(())
    }

    pub fn into_writes(self) -> WriteSet {
        self.writes
    }
}

/// Runs a mutating handler and commits its writes if it succeeds.
pub fn submit<L, T, F>(
    ledger: &mut L,
    keys: &KeyScheme,
    ctx: &TxContext,
    function: &str,
    handler: F,
) -> TxResult<T>
where
    L: Ledger + ?Sized,
    F: FnOnce(&mut Transaction<'_, L>) -> TxResult<T>,
{
    let span = info_span!("tx", tx_id = %ctx.tx_id, function, caller = %ctx.caller);
    let _enter = span.enter();

    let (result, writes) = {
        let mut tx = Transaction::new(&*ledger, keys, ctx);
        let result = handler(&mut tx);
        (result, tx.into_writes())
    };
    match result {
        Ok(Outcome::Committed(value)) => {
            let staged = writes.len();
            ledger.commit(writes, ctx.timestamp.timestamp())?;
            info!(writes = staged, "committed");
            Ok(Outcome::Committed(value))
        }
        Ok(Outcome::Declined(reason)) => {
            warn!(%reason, "declined");
            Ok(Outcome::Declined(reason))
        }
        Err(err) => {
            warn!(error = %err, "rejected");
            Err(err)
        }
    }
}

/// Runs a read-only handler; anything it stages is discarded.
pub fn evaluate<L, T, F>(
    ledger: &L,
    keys: &KeyScheme,
    ctx: &TxContext,
    function: &str,
    handler: F,
) -> Result<T, ContractError>
where
    L: Ledger + ?Sized,
    F: FnOnce(&Transaction<'_, L>) -> Result<T, ContractError>,
{
    let span = info_span!("query", tx_id = %ctx.tx_id, function);
    let _enter = span.enter();
    handler(&Transaction::new(ledger, keys, ctx))
}

/// Key scheme and identity mapping shared by both workflows.
#[derive(Clone, Debug, Default)]
pub struct Network {
    pub keys: KeyScheme,
    pub roles: MspRoles,
}

impl Network {
    pub fn new(keys: KeyScheme, roles: MspRoles) -> Self {
        Self { keys, roles }
    }

    pub fn context(&self, msp_id: &str, timestamp: DateTime<Utc>) -> TxContext {
        TxContext::new(self.roles.caller(msp_id), timestamp)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::*;
    use crate::ledger::MemoryLedger;

    pub fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(seconds)
    }

    pub fn registrar(seconds: i64) -> TxContext {
        TxContext::new(Caller::registrar(), at(seconds))
    }

    pub fn participant(seconds: i64) -> TxContext {
        TxContext::new(Caller::participant(), at(seconds))
    }

    /// Participant enrolled as `name/aadhaar_id`.
    pub fn enrolled(name: &str, aadhaar_id: &str, seconds: i64) -> TxContext {
        TxContext::new(
            Caller::participant().with_id(format!("{name}/{aadhaar_id}")),
            at(seconds),
        )
    }

    pub fn outsider(seconds: i64) -> TxContext {
        TxContext::new(MspRoles::default().caller("ordererMSP"), at(seconds))
    }

    /// Registers, approves and funds a user in one go.
    pub fn onboard(
        network: &Network,
        ledger: &mut MemoryLedger,
        name: &str,
        aadhaar_id: &str,
        token: &str,
    ) {
        network
            .request_new_user(ledger, &participant(0), name, "x@example.com", "555", aadhaar_id)
            .unwrap();
        network
            .approve_new_user(ledger, &registrar(1), name, aadhaar_id)
            .unwrap();
        network
            .recharge_account(ledger, &participant(2), name, aadhaar_id, token)
            .unwrap();
    }

    /// Lists a property owned by an existing user and approves it.
    pub fn list_property(
        network: &Network,
        ledger: &mut MemoryLedger,
        owner: (&str, &str),
        property_id: &str,
        price: Coins,
    ) {
        network
            .property_registration_request(
                ledger,
                &participant(3),
                owner.0,
                owner.1,
                property_id,
                owner.0,
                price,
                crate::model::FOR_SALE,
            )
            .unwrap();
        network
            .approve_property_registration(ledger, &registrar(4), property_id)
            .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::{testing::*, *};
    use crate::{
        ledger::MemoryLedger,
        model::{User, REGISTERED},
    };

    struct FailingCommit(MemoryLedger);

    impl Ledger for FailingCommit {
        fn get(&self, key: &LedgerKey) -> Result<Option<Vec<u8>>, LedgerError> {
            self.0.get(key)
        }

        fn put(&mut self, _key: LedgerKey, _value: Vec<u8>) -> Result<(), LedgerError> {
            Err(LedgerError::Unavailable("peer offline".into()))
        }

        fn commit(&mut self, _writes: WriteSet, _timestamp: i64) -> Result<(), LedgerError> {
            Err(LedgerError::Unavailable("peer offline".into()))
        }
    }

    #[test]
    fn alice_sells_to_bob() {
        let network = Network::default();
        let mut ledger = MemoryLedger::new();

        let request = network
            .request_new_user(&mut ledger, &participant(0), "Alice", "a@x.com", "555", "1111")
            .unwrap()
            .committed()
            .unwrap();
        assert_eq!(request.aadhaar_id, "1111");

        let alice = network
            .approve_new_user(&mut ledger, &registrar(1), "Alice", "1111")
            .unwrap()
            .committed()
            .unwrap();
        assert_eq!(alice.coin_balance, 0);

        let alice = network
            .recharge_account(&mut ledger, &participant(2), "Alice", "1111", "upg500")
            .unwrap()
            .committed()
            .unwrap();
        assert_eq!(alice.coin_balance, 500);

        network
            .property_registration_request(
                &mut ledger,
                &participant(3),
                "Alice",
                "1111",
                "P1",
                "Alice",
                100,
                "forSale",
            )
            .unwrap();
        let property = network
            .approve_property_registration(&mut ledger, &registrar(4), "P1")
            .unwrap()
            .committed()
            .unwrap();
        assert_eq!(property.status, "forSale");
        assert_eq!(property.price, 100);

        onboard(&network, &mut ledger, "Bob", "2222", "upg1000");
        let outcome = network
            .purchase_property(&mut ledger, &participant(5), "Bob", "2222", "P1")
            .unwrap();
        assert!(outcome.committed().is_some());

        let property = network.view_property(&ledger, &participant(6), "P1").unwrap();
        assert_eq!(property.owner, crate::model::UserRef::new("Bob", "2222"));
        assert_eq!(property.status, REGISTERED);
        let alice: User = network.view_user(&ledger, &participant(6), "Alice", "1111").unwrap();
        let bob: User = network.view_user(&ledger, &participant(6), "Bob", "2222").unwrap();
        assert_eq!(alice.coin_balance, 600);
        assert_eq!(bob.coin_balance, 900);
    }

    #[test]
    fn storage_failure_propagates_without_partial_state() {
        let network = Network::default();
        let mut ledger = FailingCommit(MemoryLedger::new());
        let err = network
            .request_new_user(&mut ledger, &participant(0), "Alice", "a@x.com", "555", "1111")
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(ledger.0.is_empty());
    }

    #[test]
    fn declined_handlers_drop_staged_writes() {
        let keys = KeyScheme::default();
        let ctx = participant(0);
        let mut ledger = MemoryLedger::new();
        let outcome: TxResult<()> = submit(&mut ledger, &keys, &ctx, "stageThenDecline", |tx| {
            tx.put_state(tx.keys().property("P9"), &"staged")?;
            Ok(Outcome::Declined(Decline::InvalidPrice))
        });
        assert_eq!(outcome.unwrap().declined(), Some(&Decline::InvalidPrice));
        assert!(ledger.is_empty());
    }

    #[test]
    fn staged_writes_are_visible_to_later_reads() {
        let keys = KeyScheme::default();
        let ctx = participant(0);
        let ledger = MemoryLedger::new();
        let mut tx = Transaction::new(&ledger, &keys, &ctx);
        tx.put_state(keys.property("P1"), &42u64).unwrap();
        assert_eq!(tx.get_state::<u64>(&keys.property("P1")).unwrap(), Some(42));
        assert_eq!(tx.into_writes().len(), 1);
    }

    #[test]
    fn malformed_records_surface_as_codec_errors() {
        let keys = KeyScheme::default();
        let mut ledger = MemoryLedger::new();
        ledger.put(keys.property("P1"), b"not json".to_vec()).unwrap();
        let err = Network::default()
            .view_property(&ledger, &participant(0), "P1")
            .unwrap_err();
        assert!(matches!(err, ContractError::Codec { .. }));
    }

    #[test]
    fn tx_ids_are_stable_per_caller_and_time() {
        assert_eq!(participant(1).tx_id, participant(1).tx_id);
        assert_ne!(participant(1).tx_id, participant(2).tx_id);
        assert_ne!(participant(1).tx_id, registrar(1).tx_id);
        assert_eq!(participant(1).with_tx_id("abc").tx_id, "abc");
    }

    #[test]
    fn decline_kinds_split_arguments_from_rules() {
        let token = Decline::UnknownRechargeToken {
            token: "bogus".into(),
        };
        assert_eq!(token.kind(), DeclineKind::InvalidArgument);
        let rule = Decline::NotOwner {
            property_id: "P1".into(),
        };
        assert_eq!(rule.kind(), DeclineKind::PreconditionFailed);
        assert_eq!(rule.to_string(), "caller does not own property P1");
    }
}
