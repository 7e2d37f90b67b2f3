use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub mod keys;
pub mod snapshot;

pub use keys::{EntityKind, KeyScheme, LedgerKey};
pub use snapshot::LedgerSnapshot;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
    #[error("ledger i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding failure: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("snapshot state root mismatch (expected {expected}, computed {computed})")]
    CorruptSnapshot { expected: String, computed: String },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SnapshotMetadata {
    pub height: u64,
    pub timestamp: i64,
}

/// Writes staged by one invocation, applied together by [`Ledger::commit`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteSet {
    writes: BTreeMap<LedgerKey, Vec<u8>>,
}

impl WriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&mut self, key: LedgerKey, value: Vec<u8>) {
        self.writes.insert(key, value);
    }

    pub fn get(&self, key: &LedgerKey) -> Option<&[u8]> {
        self.writes.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

impl IntoIterator for WriteSet {
    type Item = (LedgerKey, Vec<u8>);
    type IntoIter = std::collections::btree_map::IntoIter<LedgerKey, Vec<u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.writes.into_iter()
    }
}

/// Key-value store of record.
///
/// Contract writes only reach the store through [`Ledger::commit`], which
/// must apply the whole [`WriteSet`] or none of it. A backend that can only
/// write key by key has to buffer or roll back on its own.
pub trait Ledger {
    fn get(&self, key: &LedgerKey) -> Result<Option<Vec<u8>>, LedgerError>;

    fn put(&mut self, key: LedgerKey, value: Vec<u8>) -> Result<(), LedgerError>;

    fn commit(&mut self, writes: WriteSet, timestamp: i64) -> Result<(), LedgerError>;
}

#[derive(Clone, Debug, Default)]
pub struct MemoryLedger {
    pub meta: SnapshotMetadata,
    records: BTreeMap<LedgerKey, Vec<u8>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = (&LedgerKey, &[u8])> {
        self.records.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn state_root(&self) -> [u8; 32] {
        compute_state_root(&self.records)
    }
}

impl Ledger for MemoryLedger {
    fn get(&self, key: &LedgerKey) -> Result<Option<Vec<u8>>, LedgerError> {
        Ok(self.records.get(key).cloned())
    }

    fn put(&mut self, key: LedgerKey, value: Vec<u8>) -> Result<(), LedgerError> {
        self.records.insert(key, value);
        Ok(())
    }

    fn commit(&mut self, writes: WriteSet, timestamp: i64) -> Result<(), LedgerError> {
        if writes.is_empty() {
            return Ok(());
        }
        self.records.extend(writes);
        self.meta.height += 1;
        self.meta.timestamp = timestamp;
        Ok(())
    }
}

const RECORD_TAG: &[u8] = b"regnet/record";
const BRANCH_TAG: &[u8] = b"regnet/branch";
const EMPTY_TAG: &[u8] = b"regnet/empty";

pub(crate) fn compute_state_root(records: &BTreeMap<LedgerKey, Vec<u8>>) -> [u8; 32] {
    let leaves = records
        .iter()
        .map(|(key, value)| {
            let mut hasher = Sha256::new();
            hasher.update(RECORD_TAG);
            hasher.update((key.as_bytes().len() as u64).to_le_bytes());
            hasher.update(key.as_bytes());
            hasher.update(value);
            hasher.finalize().into()
        })
        .collect();
    fold_levels(leaves)
}

fn branch(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    Sha256::new()
        .chain_update(BRANCH_TAG)
        .chain_update(left)
        .chain_update(right)
        .finalize()
        .into()
}

/// Folds leaf hashes pairwise up to a single root. An odd level pairs its
/// last hash with itself.
fn fold_levels(mut level: Vec<[u8; 32]>) -> [u8; 32] {
    loop {
        match level.len() {
            0 => return Sha256::digest(EMPTY_TAG).into(),
            1 => return level[0],
            n if n % 2 == 1 => level.push(level[n - 1]),
            _ => {}
        }
        level = level
            .chunks_exact(2)
            .map(|pair| branch(&pair[0], &pair[1]))
            .collect();
    }
}
