//! Blob cache for serialized protocol objects.
//!
//! The protocol core treats the store as an opaque map `digest → bytes`
//! partitioned into four namespaces. Access is single-threaded in the
//! cooperative model; the in-memory implementation still serializes writes
//! internally so several nodes can share one store in one process.

mod memory;

pub use memory::MemoryStore;

use std::fmt;

/// The four blob namespaces the core uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Namespace {
    /// Pending outbound transactions, keyed by transaction id.
    Tx,
    /// Adopted Value proofs, keyed by value id.
    Prf,
    /// Personal-chain blocks, keyed by `"{node} {index}"`.
    Pb,
    /// Sealed transaction-sets, keyed by digest hex.
    Inf,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Tx => "TX",
            Namespace::Prf => "PRF",
            Namespace::Pb => "PB",
            Namespace::Inf => "INF",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from the blob store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store backend could not be acquired. Fatal at node init.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store's lock was poisoned by a panicking writer.
    #[error("store poisoned")]
    Poisoned,
}

/// A process-wide blob cache.
pub trait BlobStore: Send + Sync {
    /// Insert or replace a blob.
    fn put(&self, ns: Namespace, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;

    /// Fetch a blob, if present.
    fn get(&self, ns: Namespace, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Remove a blob. Removing an absent key is not an error.
    fn delete(&self, ns: Namespace, key: &str) -> Result<(), StoreError>;
}
