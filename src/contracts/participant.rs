//! Participant workflow: requests, top-ups, listings and purchases.

use tracing::{info, warn};

use super::{submit, ContractError, Decline, Network, Outcome, Transaction, TxContext, TxResult};
use crate::{
    identity::Role,
    ledger::{EntityKind, Ledger},
    model::{recharge_amount, Coins, Property, PropertyRequest, User, UserRef, UserRequest, REGISTERED},
};

pub fn request_new_user<L: Ledger + ?Sized>(
    tx: &mut Transaction<'_, L>,
    name: &str,
    email: &str,
    phone: &str,
    aadhaar_id: &str,
) -> TxResult<UserRequest> {
    tx.require_role(Role::Participant)?;
    tx.require_identity(name, aadhaar_id)?;

    let now = tx.now();
    let request = UserRequest {
        name: name.to_string(),
        email: email.to_string(),
        phone: phone.to_string(),
        aadhaar_id: aadhaar_id.to_string(),
        created_at: now,
        updated_at: now,
    };
    tx.put_state(tx.keys().user_request(name, aadhaar_id), &request)?;
    Ok(Outcome::Committed(request))
}

/// Sets the balance to the tier bought with `token`.
///
/// The tier replaces the previous balance instead of adding to it.
pub fn recharge_account<L: Ledger + ?Sized>(
    tx: &mut Transaction<'_, L>,
    name: &str,
    aadhaar_id: &str,
    token: &str,
) -> TxResult<User> {
    tx.require_role(Role::Participant)?;
    tx.require_identity(name, aadhaar_id)?;

    let user_key = tx.keys().user(name, aadhaar_id);
    let mut user: User = tx
        .get_state(&user_key)?
        .ok_or_else(|| ContractError::not_found(EntityKind::User, format!("{name}/{aadhaar_id}")))?;

    let Some(amount) = recharge_amount(token) else {
        return Ok(Outcome::Declined(Decline::UnknownRechargeToken {
            token: token.to_string(),
        }));
    };

    user.coin_balance = amount;
    user.updated_at = tx.now();
    tx.put_state(user_key, &user)?;
    info!(user = %name, balance = amount, "account recharged");
    Ok(Outcome::Committed(user))
}

/// Files a listing request owned by the resolved user.
///
/// `owner` is accepted for call compatibility only; the stored owner is
/// always the user identified by `name` and `aadhaar_id`.
#[allow(clippy::too_many_arguments)]
pub fn property_registration_request<L: Ledger + ?Sized>(
    tx: &mut Transaction<'_, L>,
    name: &str,
    aadhaar_id: &str,
    property_id: &str,
    owner: &str,
    price: Coins,
    status: &str,
) -> TxResult<PropertyRequest> {
    tx.require_role(Role::Participant)?;
    tx.require_identity(name, aadhaar_id)?;

    let user: User = tx
        .get_state(&tx.keys().user(name, aadhaar_id))?
        .ok_or_else(|| ContractError::not_found(EntityKind::User, format!("{name}/{aadhaar_id}")))?;

    if price == 0 {
        return Ok(Outcome::Declined(Decline::InvalidPrice));
    }
    if owner != user.name {
        warn!(claimed = %owner, resolved = %user.name, "ignoring owner argument");
    }

    let now = tx.now();
    let request = PropertyRequest {
        property_id: property_id.to_string(),
        price,
        status: status.to_string(),
        owner: user.reference(),
        created_at: now,
        updated_at: now,
    };
    tx.put_state(tx.keys().property_request(property_id), &request)?;
    Ok(Outcome::Committed(request))
}

/// Moves `price` coins from buyer to seller and hands the property over.
///
/// All three records are staged together and committed as one batch.
pub fn purchase_property<L: Ledger + ?Sized>(
    tx: &mut Transaction<'_, L>,
    name: &str,
    aadhaar_id: &str,
    property_id: &str,
) -> TxResult<Property> {
    tx.require_role(Role::Participant)?;
    tx.require_identity(name, aadhaar_id)?;

    let property_key = tx.keys().property(property_id);
    let mut property = match tx.get_state::<Property>(&property_key)? {
        Some(property) if property.is_for_sale() => property,
        other => {
            return Ok(Outcome::Declined(Decline::PropertyUnavailable {
                property_id: property_id.to_string(),
                status: other.map(|p| p.status),
            }))
        }
    };

    let buyer_ref = UserRef::new(name, aadhaar_id);
    if buyer_ref == property.owner {
        return Ok(Outcome::Declined(Decline::AlreadyOwner {
            property_id: property_id.to_string(),
        }));
    }

    let buyer_key = buyer_ref.key(tx.keys());
    let Some(mut buyer) = tx.get_state::<User>(&buyer_key)? else {
        return Ok(Outcome::Declined(Decline::BuyerUnknown {
            name: name.to_string(),
        }));
    };
    let seller_key = property.owner.key(tx.keys());
    let Some(mut seller) = tx.get_state::<User>(&seller_key)? else {
        return Ok(Outcome::Declined(Decline::SellerUnknown {
            name: property.owner.name.clone(),
            property_id: property_id.to_string(),
        }));
    };

    let price = property.price;
    if buyer.coin_balance <= price {
        return Ok(Outcome::Declined(Decline::InsufficientFunds {
            balance: buyer.coin_balance,
            price,
        }));
    }
    let Some(seller_balance) = seller.coin_balance.checked_add(price) else {
        return Ok(Outcome::Declined(Decline::BalanceOverflow {
            name: seller.name.clone(),
            amount: price,
        }));
    };

    let now = tx.now();
    buyer.coin_balance -= price;
    buyer.updated_at = now;
    seller.coin_balance = seller_balance;
    seller.updated_at = now;
    property.owner = buyer_ref;
    property.status = REGISTERED.to_string();
    property.updated_at = now;

    tx.put_state(property_key, &property)?;
    tx.put_state(buyer_key, &buyer)?;
    tx.put_state(seller_key, &seller)?;
    info!(property = %property_id, buyer = %buyer.name, seller = %seller.name, price, "property sold");
    Ok(Outcome::Committed(property))
}

/// Changes the status of a property owned by the caller.
pub fn update_property<L: Ledger + ?Sized>(
    tx: &mut Transaction<'_, L>,
    name: &str,
    aadhaar_id: &str,
    property_id: &str,
    status: &str,
) -> TxResult<Property> {
    tx.require_role(Role::Participant)?;
    tx.require_identity(name, aadhaar_id)?;

    let property_key = tx.keys().property(property_id);
    let mut property: Property = tx
        .get_state(&property_key)?
        .ok_or_else(|| ContractError::not_found(EntityKind::Property, property_id))?;

    if property.owner != UserRef::new(name, aadhaar_id) {
        return Ok(Outcome::Declined(Decline::NotOwner {
            property_id: property_id.to_string(),
        }));
    }

    if property.status != status {
        property.status = status.to_string();
        property.updated_at = tx.now();
    }
    tx.put_state(property_key, &property)?;
    Ok(Outcome::Committed(property))
}

impl Network {
    pub fn request_new_user<L: Ledger + ?Sized>(
        &self,
        ledger: &mut L,
        ctx: &TxContext,
        name: &str,
        email: &str,
        phone: &str,
        aadhaar_id: &str,
    ) -> TxResult<UserRequest> {
        submit(ledger, &self.keys, ctx, "requestNewUser", |tx| {
            request_new_user(tx, name, email, phone, aadhaar_id)
        })
    }

    pub fn recharge_account<L: Ledger + ?Sized>(
        &self,
        ledger: &mut L,
        ctx: &TxContext,
        name: &str,
        aadhaar_id: &str,
        token: &str,
    ) -> TxResult<User> {
        submit(ledger, &self.keys, ctx, "rechargeAccount", |tx| {
            recharge_account(tx, name, aadhaar_id, token)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn property_registration_request<L: Ledger + ?Sized>(
        &self,
        ledger: &mut L,
        ctx: &TxContext,
        name: &str,
        aadhaar_id: &str,
        property_id: &str,
        owner: &str,
        price: Coins,
        status: &str,
    ) -> TxResult<PropertyRequest> {
        submit(ledger, &self.keys, ctx, "propertyRegistrationRequest", |tx| {
            property_registration_request(tx, name, aadhaar_id, property_id, owner, price, status)
        })
    }

    pub fn purchase_property<L: Ledger + ?Sized>(
        &self,
        ledger: &mut L,
        ctx: &TxContext,
        name: &str,
        aadhaar_id: &str,
        property_id: &str,
    ) -> TxResult<Property> {
        submit(ledger, &self.keys, ctx, "purchaseProperty", |tx| {
            purchase_property(tx, name, aadhaar_id, property_id)
        })
    }

    pub fn update_property<L: Ledger + ?Sized>(
        &self,
        ledger: &mut L,
        ctx: &TxContext,
        name: &str,
        aadhaar_id: &str,
        property_id: &str,
        status: &str,
    ) -> TxResult<Property> {
        submit(ledger, &self.keys, ctx, "updateProperty", |tx| {
            update_property(tx, name, aadhaar_id, property_id, status)
        })
    }
}
