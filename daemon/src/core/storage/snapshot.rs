use super::{StorageError, StorageProvider};
use log::trace;
use std::collections::{BTreeMap, HashMap};

/// Represents the state of an entry in an overlay layer.
/// This provides a clearer API than nested Option<Option<T>>.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryState<T> {
    /// The entry has been added/modified in this layer
    Stored(T),
    /// The entry has been deleted in this layer
    Deleted,
    /// The entry is not present in this layer, fall back to the layer below
    Absent,
}

impl<T> EntryState<T> {
    pub fn is_stored(&self) -> bool {
        matches!(self, EntryState::Stored(_))
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, EntryState::Deleted)
    }

    pub fn stored(self) -> Option<T> {
        match self {
            EntryState::Stored(value) => Some(value),
            _ => None,
        }
    }
}

// Layered copy-on-write view over a storage provider, bounding the effects
// of one block.
//
// Two layers sit above the durable provider: the block layer collects the
// effects of committed transactions and lifecycle hooks, and a transient
// transaction layer absorbs all writes of the script currently executing.
// Committing folds the transaction layer down, discarding drops it, so a
// faulted transaction leaves no trace. Nothing reaches the provider until
// `into_changes` at the block boundary.
pub struct Overlay<'a> {
    provider: &'a dyn StorageProvider,
    committed: HashMap<Vec<u8>, EntryState<Vec<u8>>>,
    pending: Option<HashMap<Vec<u8>, EntryState<Vec<u8>>>>,
}

impl<'a> Overlay<'a> {
    pub fn new(provider: &'a dyn StorageProvider) -> Self {
        Overlay {
            provider,
            committed: HashMap::new(),
            pending: None,
        }
    }

    // Open the per-transaction layer
    pub fn begin(&mut self) -> Result<(), StorageError> {
        if self.pending.is_some() {
            return Err(StorageError::LayerAlreadyOpen);
        }
        self.pending = Some(HashMap::new());
        Ok(())
    }

    // Fold the transaction layer into the block layer (the transaction
    // halted)
    pub fn commit(&mut self) -> Result<(), StorageError> {
        let pending = self.pending.take().ok_or(StorageError::NoOpenLayer)?;
        trace!("committing transaction layer with {} entries", pending.len());
        for (key, state) in pending {
            self.committed.insert(key, state);
        }
        Ok(())
    }

    // Drop the transaction layer (the transaction faulted)
    pub fn discard(&mut self) -> Result<(), StorageError> {
        let pending = self.pending.take().ok_or(StorageError::NoOpenLayer)?;
        trace!("discarding transaction layer with {} entries", pending.len());
        Ok(())
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        if let Some(pending) = &self.pending {
            match pending.get(key) {
                Some(EntryState::Stored(value)) => return Ok(Some(value.clone())),
                Some(EntryState::Deleted) => return Ok(None),
                Some(EntryState::Absent) | None => {}
            }
        }
        match self.committed.get(key) {
            Some(EntryState::Stored(value)) => return Ok(Some(value.clone())),
            Some(EntryState::Deleted) => return Ok(None),
            Some(EntryState::Absent) | None => {}
        }
        self.provider.get(key)
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool, StorageError> {
        Ok(self.get(key)?.is_some())
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        let layer = self.pending.as_mut().unwrap_or(&mut self.committed);
        layer.insert(key, EntryState::Stored(value));
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        let layer = self.pending.as_mut().unwrap_or(&mut self.committed);
        layer.insert(key, EntryState::Deleted);
    }

    // Consume the overlay at the block boundary. Keys are ordered so the
    // flush to the provider is reproducible.
    pub fn into_changes(self) -> BTreeMap<Vec<u8>, EntryState<Vec<u8>>> {
        debug_assert!(self.pending.is_none(), "open transaction layer at flush");
        self.committed.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::MemoryProvider;

    #[test]
    fn test_discard_leaves_no_trace() {
        let provider = MemoryProvider::new();
        let mut overlay = Overlay::new(&provider);

        overlay.begin().unwrap();
        overlay.put(b"a".to_vec(), b"1".to_vec());
        overlay.delete(b"b".to_vec());
        overlay.discard().unwrap();

        assert_eq!(overlay.get(b"a").unwrap(), None);
        assert!(overlay.into_changes().is_empty());
    }

    #[test]
    fn test_commit_folds_into_block_layer() {
        let provider = MemoryProvider::new();
        let mut overlay = Overlay::new(&provider);

        overlay.begin().unwrap();
        overlay.put(b"a".to_vec(), b"1".to_vec());
        overlay.commit().unwrap();

        // visible to the next transaction layer
        overlay.begin().unwrap();
        assert_eq!(overlay.get(b"a").unwrap(), Some(b"1".to_vec()));
        overlay.discard().unwrap();

        let changes = overlay.into_changes();
        assert_eq!(
            changes.get(b"a".as_slice()),
            Some(&EntryState::Stored(b"1".to_vec()))
        );
    }

    #[test]
    fn test_delete_shadows_provider() {
        let mut provider = MemoryProvider::new();
        provider.put(b"a".to_vec(), b"1".to_vec()).unwrap();

        let mut overlay = Overlay::new(&provider);
        assert_eq!(overlay.get(b"a").unwrap(), Some(b"1".to_vec()));

        overlay.begin().unwrap();
        overlay.delete(b"a".to_vec());
        assert_eq!(overlay.get(b"a").unwrap(), None);
        overlay.commit().unwrap();
        assert_eq!(overlay.get(b"a").unwrap(), None);
    }

    #[test]
    fn test_double_begin_rejected() {
        let provider = MemoryProvider::new();
        let mut overlay = Overlay::new(&provider);
        overlay.begin().unwrap();
        assert!(matches!(
            overlay.begin(),
            Err(StorageError::LayerAlreadyOpen)
        ));
    }
}
