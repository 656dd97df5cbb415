mod memory;
mod sled;
mod snapshot;

pub use self::sled::SledProvider;
pub use memory::MemoryProvider;
pub use snapshot::{EntryState, Overlay};

use meridian_common::crypto::{Hash, HASH_SIZE};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Sled error: {0}")]
    Sled(#[from] ::sled::Error),

    #[error("A transaction layer is already open")]
    LayerAlreadyOpen,

    #[error("No transaction layer is open")]
    NoOpenLayer,

    #[error(transparent)]
    Any(#[from] anyhow::Error),
}

// Durable key-value backend. All reads during script execution go through
// the in-memory Overlay, the provider is only hit for keys the overlay has
// not seen and at the block-boundary flush. Implementations must be
// synchronous: the engine never blocks on I/O mid-execution.
pub trait StorageProvider: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StorageError>;

    fn delete(&mut self, key: &[u8]) -> Result<(), StorageError>;

    fn contains(&self, key: &[u8]) -> Result<bool, StorageError> {
        Ok(self.get(key)?.is_some())
    }

    // Make everything written so far durable. Called once per block,
    // outside the hot execution path.
    fn flush(&mut self) -> Result<(), StorageError>;

    // Full ordered dump, used by state comparisons and tests
    fn entries(&self) -> Result<BTreeMap<Vec<u8>, Vec<u8>>, StorageError>;
}

// Storage keys are namespaced by the owning native contract:
// (script hash || logical prefix || domain key)
pub fn storage_key(contract: &Hash, prefix: u8, suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(HASH_SIZE + 1 + suffix.len());
    key.extend_from_slice(contract.as_bytes());
    key.push(prefix);
    key.extend_from_slice(suffix);
    key
}

// Node-internal bookkeeping (chain height, last block hash). The 0xFF
// prefix plus a short name can never collide with a contract namespace,
// those keys are always at least 33 bytes long.
pub fn meta_key(name: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + name.len());
    key.push(0xFF);
    key.extend_from_slice(name);
    key
}
