//! In-memory blob store.

use crate::{BlobStore, Namespace, StoreError};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// In-memory implementation of [`BlobStore`].
///
/// Backed by one ordered map per process; the mutex serializes writers
/// when several nodes share the store in one process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<BTreeMap<(Namespace, String), Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs in a namespace.
    pub fn len(&self, ns: Namespace) -> usize {
        self.blobs
            .lock()
            .map(|map| map.keys().filter(|(n, _)| *n == ns).count())
            .unwrap_or(0)
    }

    /// Total stored bytes in a namespace.
    pub fn bytes(&self, ns: Namespace) -> usize {
        self.blobs
            .lock()
            .map(|map| {
                map.iter()
                    .filter(|((n, _), _)| *n == ns)
                    .map(|(_, v)| v.len())
                    .sum()
            })
            .unwrap_or(0)
    }
}

impl BlobStore for MemoryStore {
    fn put(&self, ns: Namespace, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let mut map = self.blobs.lock().map_err(|_| StoreError::Poisoned)?;
        map.insert((ns, key.to_string()), bytes);
        Ok(())
    }

    fn get(&self, ns: Namespace, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let map = self.blobs.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(map.get(&(ns, key.to_string())).cloned())
    }

    fn delete(&self, ns: Namespace, key: &str) -> Result<(), StoreError> {
        let mut map = self.blobs.lock().map_err(|_| StoreError::Poisoned)?;
        map.remove(&(ns, key.to_string()));
        Ok(())
    }
}
