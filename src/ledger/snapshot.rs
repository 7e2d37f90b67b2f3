use std::{collections::BTreeMap, fs, path::Path};

use serde::{Deserialize, Serialize};

use super::{compute_state_root, LedgerError, LedgerKey, MemoryLedger, SnapshotMetadata};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub key: LedgerKey,
    #[serde(with = "crate::ledger::snapshot::serde_bytes")]
    pub value: Vec<u8>,
}

/// Portable image of a [`MemoryLedger`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub meta: SnapshotMetadata,
    pub entries: Vec<SnapshotEntry>,
    pub state_root: String,
}

impl MemoryLedger {
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            meta: self.meta.clone(),
            entries: self
                .records
                .iter()
                .map(|(key, value)| SnapshotEntry {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
            state_root: hex::encode(self.state_root()),
        }
    }

    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Result<Self, LedgerError> {
        let records: BTreeMap<LedgerKey, Vec<u8>> = snapshot
            .entries
            .into_iter()
            .map(|entry| (entry.key, entry.value))
            .collect();
        let computed = hex::encode(compute_state_root(&records));
        if computed != snapshot.state_root {
            return Err(LedgerError::CorruptSnapshot {
                expected: snapshot.state_root,
                computed,
            });
        }
        Ok(Self {
            meta: snapshot.meta,
            records,
        })
    }

    /// Reads a snapshot file; a missing file yields an empty ledger.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let bytes = fs::read(path)?;
        let snapshot: LedgerSnapshot = serde_json::from_slice(&bytes)?;
        Self::from_snapshot(snapshot)
    }

    pub fn save(&self, path: &Path) -> Result<(), LedgerError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_vec_pretty(&self.snapshot())?;
        // write-then-rename so a crash never leaves a torn snapshot
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

pub(crate) mod serde_bytes {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(&encoded).map_err(D::Error::custom)
    }
}
