use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_NAMESPACE: &str = "org.property-registration-network.regnet";

const DELIMITER: char = '\u{0}';

/// Record families sharing the ledger namespace.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Request,
    User,
    PropertyRequest,
    Property,
}

impl EntityKind {
    pub fn tag(self) -> &'static str {
        match self {
            EntityKind::Request => "request",
            EntityKind::User => "user",
            EntityKind::PropertyRequest => "propertyReq",
            EntityKind::Property => "property",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Fully encoded composite key as stored in the ledger.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct LedgerKey(String);

impl LedgerKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // NUL delimiters are unreadable in logs
        f.write_str(&self.0.replace(DELIMITER, "/"))
    }
}

/// Builds composite keys under one namespace.
///
/// Layout: `\0<namespace>.<tag>\0` followed by `<len>:<field>\0` per field.
/// The length prefix keeps distinct field tuples distinct even when a field
/// contains the delimiter itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyScheme {
    namespace: String,
}

impl Default for KeyScheme {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl KeyScheme {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn make_key(&self, kind: EntityKind, fields: &[&str]) -> LedgerKey {
        let mut key = String::with_capacity(
            self.namespace.len() + 16 + fields.iter().map(|f| f.len() + 8).sum::<usize>(),
        );
        key.push(DELIMITER);
        key.push_str(&self.namespace);
        key.push('.');
        key.push_str(kind.tag());
        key.push(DELIMITER);
        for field in fields {
            key.push_str(&field.len().to_string());
            key.push(':');
            key.push_str(field);
            key.push(DELIMITER);
        }
        LedgerKey(key)
    }

    pub fn user_request(&self, name: &str, aadhaar_id: &str) -> LedgerKey {
        self.make_key(EntityKind::Request, &[name, aadhaar_id])
    }

    pub fn user(&self, name: &str, aadhaar_id: &str) -> LedgerKey {
        self.make_key(EntityKind::User, &[name, aadhaar_id])
    }

    pub fn property_request(&self, property_id: &str) -> LedgerKey {
        self.make_key(EntityKind::PropertyRequest, &[property_id])
    }

    pub fn property(&self, property_id: &str) -> LedgerKey {
        self.make_key(EntityKind::Property, &[property_id])
    }
}
