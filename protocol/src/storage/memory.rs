//! In-memory [`KvStore`] backend.

use parking_lot::RwLock;
use std::collections::BTreeMap;

use super::{KvStore, StoreResult, WriteBatch};

/// A `BTreeMap` behind a lock. Commits are atomic with respect to readers
/// because the whole batch is applied under one write guard.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.entries.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn scan(&self, start: &[u8], end: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        if start >= end {
            return Ok(Vec::new());
        }
        let entries = self.entries.read();
        Ok(entries
            .range(start.to_vec()..end.to_vec())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut entries = self.entries.write();
        for (key, value) in batch.into_writes() {
            entries.insert(key, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_is_half_open_and_ordered() {
        let store = MemoryStore::new();
        for key in [b"a/2".as_slice(), b"a/1", b"b/1", b"a/3"] {
            store.put(key, b"x").unwrap();
        }
        let keys: Vec<Vec<u8>> = store
            .scan(b"a/", b"a/3")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![b"a/1".to_vec(), b"a/2".to_vec()]);
    }

    #[test]
    fn commit_applies_whole_batch() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.put(b"k1".to_vec(), b"v1".to_vec());
        batch.put(b"k2".to_vec(), b"v2".to_vec());
        batch.put(b"k1".to_vec(), b"v3".to_vec());
        store.commit(batch).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(b"k1").unwrap(), Some(b"v3".to_vec()));
    }
}
