//! Ledger records for users, properties and the requests that precede them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::{KeyScheme, LedgerKey};

pub type Coins = u64;

pub const FOR_SALE: &str = "forSale";
pub const REGISTERED: &str = "registered";

/// Closed table of bank transaction tokens accepted by a recharge.
pub const RECHARGE_TIERS: [(&str, Coins); 3] = [("upg100", 100), ("upg500", 500), ("upg1000", 1000)];

pub fn recharge_amount(token: &str) -> Option<Coins> {
    RECHARGE_TIERS
        .iter()
        .find(|(tier, _)| *tier == token)
        .map(|(_, amount)| *amount)
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub aadhaar_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub aadhaar_id: String,
    pub coin_balance: Coins,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn from_request(request: &UserRequest, now: DateTime<Utc>) -> Self {
        Self {
            name: request.name.clone(),
            email: request.email.clone(),
            phone: request.phone.clone(),
            aadhaar_id: request.aadhaar_id.clone(),
            coin_balance: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn reference(&self) -> UserRef {
        UserRef::new(&self.name, &self.aadhaar_id)
    }
}

/// Weak reference from a property to the user owning it.
///
/// Only the identity tuple is stored; the user record is looked up through
/// [`UserRef::key`] whenever it is needed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub name: String,
    pub aadhaar_id: String,
}

impl UserRef {
    pub fn new(name: impl Into<String>, aadhaar_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aadhaar_id: aadhaar_id.into(),
        }
    }

    pub fn key(&self, keys: &KeyScheme) -> LedgerKey {
        keys.user(&self.name, &self.aadhaar_id)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRequest {
    pub property_id: String,
    pub price: Coins,
    pub status: String,
    pub owner: UserRef,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub property_id: String,
    pub price: Coins,
    pub status: String,
    pub owner: UserRef,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Property {
    pub fn from_request(request: &PropertyRequest, now: DateTime<Utc>) -> Self {
        Self {
            property_id: request.property_id.clone(),
            price: request.price,
            status: request.status.clone(),
            owner: request.owner.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_for_sale(&self) -> bool {
        self.status == FOR_SALE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recharge_table_is_closed() {
        assert_eq!(recharge_amount("upg100"), Some(100));
        assert_eq!(recharge_amount("upg500"), Some(500));
        assert_eq!(recharge_amount("upg1000"), Some(1000));
        assert_eq!(recharge_amount("upg5000"), None);
        assert_eq!(recharge_amount("UPG100"), None);
    }

    #[test]
    fn records_use_camel_case_fields() {
        let now = Utc::now();
        let property = Property {
            property_id: "P1".into(),
            price: 100,
            status: FOR_SALE.into(),
            owner: UserRef::new("Alice", "1111"),
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&property).unwrap();
        assert_eq!(json["propertyId"], "P1");
        assert_eq!(json["owner"]["aadhaarId"], "1111");
        assert!(property.is_for_sale());
    }

    #[test]
    fn user_reference_resolves_to_user_key() {
        let keys = KeyScheme::default();
        let owner = UserRef::new("Alice", "1111");
        assert_eq!(owner.key(&keys), keys.user("Alice", "1111"));
    }
}
