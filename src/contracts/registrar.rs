//! Registrar workflow: turns pending requests into active records.

use tracing::info;

use super::{evaluate, submit, ContractError, Decline, Network, Outcome, Transaction, TxContext, TxResult};
use crate::{
    identity::Role,
    ledger::{EntityKind, Ledger},
    model::{Property, PropertyRequest, User, UserRequest},
};

pub fn approve_new_user<L: Ledger + ?Sized>(
    tx: &mut Transaction<'_, L>,
    name: &str,
    aadhaar_id: &str,
) -> TxResult<User> {
    tx.require_role(Role::Registrar)?;

    let request_key = tx.keys().user_request(name, aadhaar_id);
    let request: UserRequest = tx
        .get_state(&request_key)?
        .ok_or_else(|| ContractError::not_found(EntityKind::Request, format!("{name}/{aadhaar_id}")))?;

    let user_key = tx.keys().user(name, aadhaar_id);
    if tx.get_state::<User>(&user_key)?.is_some() {
        return Ok(Outcome::Declined(Decline::AlreadyApproved {
            kind: EntityKind::User,
            id: format!("{name}/{aadhaar_id}"),
        }));
    }

    let user = User::from_request(&request, tx.now());
    tx.put_state(user_key, &user)?;
    info!(user = %name, "user approved");
    Ok(Outcome::Committed(user))
}

pub fn approve_property_registration<L: Ledger + ?Sized>(
    tx: &mut Transaction<'_, L>,
    property_id: &str,
) -> TxResult<Property> {
    tx.require_role(Role::Registrar)?;

    let request = match tx.get_state::<PropertyRequest>(&tx.keys().property_request(property_id))? {
        Some(request) => request,
        None => {
            return Ok(Outcome::Declined(Decline::PropertyRequestMissing {
                property_id: property_id.to_string(),
            }))
        }
    };

    let property_key = tx.keys().property(property_id);
    if tx.get_state::<Property>(&property_key)?.is_some() {
        return Ok(Outcome::Declined(Decline::AlreadyApproved {
            kind: EntityKind::Property,
            id: property_id.to_string(),
        }));
    }

    let property = Property::from_request(&request, tx.now());
    tx.put_state(property_key, &property)?;
    info!(property = %property_id, owner = %request.owner.name, "property approved");
    Ok(Outcome::Committed(property))
}

pub fn view_user<L: Ledger + ?Sized>(
    tx: &Transaction<'_, L>,
    name: &str,
    aadhaar_id: &str,
) -> Result<User, ContractError> {
    tx.get_state(&tx.keys().user(name, aadhaar_id))?
        .ok_or_else(|| ContractError::not_found(EntityKind::User, format!("{name}/{aadhaar_id}")))
}

pub fn view_property<L: Ledger + ?Sized>(
    tx: &Transaction<'_, L>,
    property_id: &str,
) -> Result<Property, ContractError> {
    tx.get_state(&tx.keys().property(property_id))?
        .ok_or_else(|| ContractError::not_found(EntityKind::Property, property_id))
}

impl Network {
    pub fn approve_new_user<L: Ledger + ?Sized>(
        &self,
        ledger: &mut L,
        ctx: &TxContext,
        name: &str,
        aadhaar_id: &str,
    ) -> TxResult<User> {
        submit(ledger, &self.keys, ctx, "approveNewUser", |tx| {
            approve_new_user(tx, name, aadhaar_id)
        })
    }

    pub fn approve_property_registration<L: Ledger + ?Sized>(
        &self,
        ledger: &mut L,
        ctx: &TxContext,
        property_id: &str,
    ) -> TxResult<Property> {
        submit(ledger, &self.keys, ctx, "approvePropertyRegistration", |tx| {
            approve_property_registration(tx, property_id)
        })
    }

    pub fn view_user<L: Ledger + ?Sized>(
        &self,
        ledger: &L,
        ctx: &TxContext,
        name: &str,
        aadhaar_id: &str,
    ) -> Result<User, ContractError> {
        evaluate(ledger, &self.keys, ctx, "viewUser", |tx| {
            view_user(tx, name, aadhaar_id)
        })
    }

    pub fn view_property<L: Ledger + ?Sized>(
        &self,
        ledger: &L,
        ctx: &TxContext,
        property_id: &str,
    ) -> Result<Property, ContractError> {
        evaluate(ledger, &self.keys, ctx, "viewProperty", |tx| {
            view_property(tx, property_id)
        })
    }
}
