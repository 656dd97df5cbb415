use super::{StorageError, StorageProvider};
use std::collections::BTreeMap;

// In-memory provider used by tests, mempool pre-validation and any other
// ephemeral execution that must never touch committed storage
#[derive(Debug, Default, Clone)]
pub struct MemoryProvider {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageProvider for MemoryProvider {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StorageError> {
        self.entries.insert(key, value);
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        Ok(())
    }

    fn entries(&self) -> Result<BTreeMap<Vec<u8>, Vec<u8>>, StorageError> {
        Ok(self.entries.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_operations() {
        let mut provider = MemoryProvider::new();
        provider.put(b"a".to_vec(), b"1".to_vec()).unwrap();
        assert_eq!(provider.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert!(provider.contains(b"a").unwrap());

        provider.delete(b"a").unwrap();
        assert_eq!(provider.get(b"a").unwrap(), None);
    }
}
