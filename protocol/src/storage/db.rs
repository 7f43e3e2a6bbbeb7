//! # SledStore — Persistent Storage Backend
//!
//! The on-disk [`KvStore`], built on sled's embedded key-value store.
//!
//! All ledger records live in one named tree, `ledger`, separated by the
//! prefixes in [`keys`](super::keys). Heights in metadata are big-endian so
//! sled's lexicographic order matches numeric order.
//!
//! ## Atomicity
//!
//! A block's records and the new height go into a single sled `Batch`,
//! followed by a flush. Either everything lands on disk or nothing does.

use sled::{Batch, Db, Tree};
use std::path::Path;

use super::{KvStore, StoreResult, WriteBatch};

const LEDGER_TREE: &str = "ledger";

/// Sled-backed store.
///
/// # Thread Safety
///
/// sled trees support lock-free concurrent reads and serialized writes, so
/// a `SledStore` can be shared across threads without external locking.
#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
    tree: Tree,
}

impl SledStore {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A database that is deleted when dropped. For tests.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let tree = db.open_tree(LEDGER_TREE)?;
        Ok(Self { db, tree })
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Block until all buffered writes are durable.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl KvStore for SledStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.tree.get(key)?.map(|v| v.to_vec()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.tree.insert(key, value)?;
        Ok(())
    }

    fn scan(&self, start: &[u8], end: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        if start >= end {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for result in self.tree.range(start..end) {
            let (key, value) = result?;
            entries.push((key.to_vec(), value.to_vec()));
        }
        Ok(entries)
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut sled_batch = Batch::default();
        for (key, value) in batch.into_writes() {
            sled_batch.insert(key, value);
        }
        self.tree.apply_batch(sled_batch)?;
        self.db.flush()?;
        Ok(())
    }
}
