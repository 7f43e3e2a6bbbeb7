//! # Storage Module
//!
//! The persistence contract of the ledger and its two backends.
//!
//! ## Architecture
//!
//! ```text
//! keys.rs   — key layout: one prefix per record family, plus metadata keys
//! db.rs     — SledStore, the on-disk backend
//! memory.rs — MemoryStore, a BTreeMap backend for tests and tooling
//! ```
//!
//! ## Contract
//!
//! A store is an ordered byte-keyed map with point reads, range scans, and
//! an atomic multi-key commit. The ledger writes every block as one
//! [`WriteBatch`]: either the whole block lands or none of it does. Nothing
//! else about the engine underneath is assumed.
//!
//! ## Design Decisions
//!
//! 1. **One keyspace, prefixed.** Record families are separated by key
//!    prefix rather than by tree, so a single batch is atomic across all of
//!    them on every backend.
//!
//! 2. **Bincode values.** Compact, fast, deterministic. The same bytes feed
//!    the state digest, so a reloaded state hashes identically.
//!
//! 3. **Indexes are not stored.** Owner, ticker, and pair indexes are
//!    rebuilt in memory on open.

pub mod db;
pub mod keys;
pub mod memory;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub use db::SledStore;
pub use memory::MemoryStore;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt record under key {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// The backing medium failed (I/O). Nothing about the stored data is
    /// known to be wrong.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        match err {
            sled::Error::Io(io) => StoreError::Unavailable(io.to_string()),
            other => StoreError::Sled(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Ordered key-value persistence.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Single-key write, outside any batch.
    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// All entries with `start <= key < end`, ascending.
    fn scan(&self, start: &[u8], end: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Apply every write in `batch` atomically and durably.
    fn commit(&self, batch: WriteBatch) -> StoreResult<()>;
}

impl<S: KvStore + ?Sized> KvStore for std::sync::Arc<S> {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        (**self).put(key, value)
    }

    fn scan(&self, start: &[u8], end: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        (**self).scan(start, end)
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        (**self).commit(batch)
    }
}

/// An ordered set of writes committed together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    writes: Vec<(Vec<u8>, Vec<u8>)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.writes.push((key, value));
    }

    /// Serialize `value` with bincode and queue it under `key`.
    pub fn put_record<T: Serialize>(&mut self, key: Vec<u8>, value: &T) -> StoreResult<()> {
        let bytes = encode(value)?;
        self.put(key, bytes);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn into_writes(self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.writes
    }
}

pub fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(key: &[u8], bytes: &[u8]) -> StoreResult<T> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Corrupt {
        key: String::from_utf8_lossy(key).into_owned(),
        reason: e.to_string(),
    })
}
