//! Name-based entry point used by the invoking platform.
//!
//! Arguments arrive as positional strings, exactly as a client submits them.

use std::{fmt, str::FromStr};

use serde::Serialize;
use serde_json::Value;

use super::{ContractError, Network, Outcome, TxContext};
use crate::{ledger::Ledger, model::Coins};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Function {
    ApproveNewUser,
    ApprovePropertyRegistration,
    ViewUser,
    ViewProperty,
    RequestNewUser,
    RechargeAccount,
    PropertyRegistrationRequest,
    PurchaseProperty,
    UpdateProperty,
}

impl Function {
    pub const ALL: [Function; 9] = [
        Function::ApproveNewUser,
        Function::ApprovePropertyRegistration,
        Function::ViewUser,
        Function::ViewProperty,
        Function::RequestNewUser,
        Function::RechargeAccount,
        Function::PropertyRegistrationRequest,
        Function::PurchaseProperty,
        Function::UpdateProperty,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Function::ApproveNewUser => "approveNewUser",
            Function::ApprovePropertyRegistration => "approvePropertyRegistration",
            Function::ViewUser => "viewUser",
            Function::ViewProperty => "viewProperty",
            Function::RequestNewUser => "requestNewUser",
            Function::RechargeAccount => "rechargeAccount",
            Function::PropertyRegistrationRequest => "propertyRegistrationRequest",
            Function::PurchaseProperty => "purchaseProperty",
            Function::UpdateProperty => "updateProperty",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Function::ApprovePropertyRegistration | Function::ViewProperty => 1,
            Function::ApproveNewUser | Function::ViewUser => 2,
            Function::RechargeAccount | Function::PurchaseProperty => 3,
            Function::RequestNewUser | Function::UpdateProperty => 4,
            Function::PropertyRegistrationRequest => 6,
        }
    }

    /// Queries never write, so callers may skip persisting after them.
    pub fn is_query(self) -> bool {
        matches!(self, Function::ViewUser | Function::ViewProperty)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Function {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Function::ALL
            .into_iter()
            .find(|function| function.name() == s)
            .ok_or_else(|| ContractError::UnknownFunction(s.to_string()))
    }
}

fn to_value<T: Serialize>(function: Function, record: T) -> Result<Value, ContractError> {
    serde_json::to_value(record).map_err(|source| ContractError::Codec {
        key: format!("{function} result"),
        source,
    })
}

fn parse_price(raw: &str) -> Result<Coins, ContractError> {
    raw.trim()
        .parse()
        .map_err(|err: std::num::ParseIntError| ContractError::InvalidArgument {
            name: "price",
            reason: format!("{raw:?}: {err}"),
        })
}

/// Runs `function` with positional `args`.
///
/// Queries are reported as [`Outcome::Committed`] even though they write
/// nothing.
pub fn invoke<L: Ledger + ?Sized>(
    network: &Network,
    ledger: &mut L,
    ctx: &TxContext,
    function: &str,
    args: &[String],
) -> Result<Outcome<Value>, ContractError> {
    let function: Function = function.parse()?;
    if args.len() != function.arity() {
        return Err(ContractError::Arity {
            function: function.name().to_string(),
            expected: function.arity(),
            actual: args.len(),
        });
    }
    let a: Vec<&str> = args.iter().map(String::as_str).collect();

    let outcome = match function {
        Function::ApproveNewUser => network
            .approve_new_user(ledger, ctx, a[0], a[1])?
            .map(|user| to_value(function, user)),
        Function::ApprovePropertyRegistration => network
            .approve_property_registration(ledger, ctx, a[0])?
            .map(|property| to_value(function, property)),
        Function::ViewUser => {
            Outcome::Committed(to_value(function, network.view_user(&*ledger, ctx, a[0], a[1])?))
        }
        Function::ViewProperty => {
            Outcome::Committed(to_value(function, network.view_property(&*ledger, ctx, a[0])?))
        }
        Function::RequestNewUser => network
            .request_new_user(ledger, ctx, a[0], a[1], a[2], a[3])?
            .map(|request| to_value(function, request)),
        Function::RechargeAccount => network
            .recharge_account(ledger, ctx, a[0], a[1], a[2])?
            .map(|user| to_value(function, user)),
        Function::PropertyRegistrationRequest => {
            let price = parse_price(a[4])?;
            network
                .property_registration_request(ledger, ctx, a[0], a[1], a[2], a[3], price, a[5])?
                .map(|request| to_value(function, request))
        }
        Function::PurchaseProperty => network
            .purchase_property(ledger, ctx, a[0], a[1], a[2])?
            .map(|property| to_value(function, property)),
        Function::UpdateProperty => network
            .update_property(ledger, ctx, a[0], a[1], a[2], a[3])?
            .map(|property| to_value(function, property)),
    };

    Ok(match outcome {
        Outcome::Committed(value) => Outcome::Committed(value?),
        Outcome::Declined(reason) => Outcome::Declined(reason),
    })
}
