use super::{StorageError, StorageProvider};
use log::debug;
use std::{collections::BTreeMap, path::Path};

// Durable provider backed by a sled tree.
// Writes land in sled's page cache and are made durable by `flush` at the
// block boundary, never mid-execution.
pub struct SledProvider {
    db: sled::Db,
}

impl SledProvider {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        debug!("Opening sled database at {}", path.as_ref().display());
        let db = sled::open(path)?;
        Ok(SledProvider { db })
    }
}

impl StorageProvider for SledProvider {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.db.get(key)?.map(|value| value.to_vec()))
    }

    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StorageError> {
        self.db.insert(key, value)?;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StorageError> {
        self.db.remove(key)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    fn entries(&self) -> Result<BTreeMap<Vec<u8>, Vec<u8>>, StorageError> {
        let mut entries = BTreeMap::new();
        for result in self.db.iter() {
            let (key, value) = result?;
            entries.insert(key.to_vec(), value.to_vec());
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_persistence_across_reopen() {
        let dir = TempDir::new("meridian-sled-test").unwrap();
        {
            let mut provider = SledProvider::open(dir.path()).unwrap();
            provider.put(b"key".to_vec(), b"value".to_vec()).unwrap();
            provider.flush().unwrap();
        }
        let provider = SledProvider::open(dir.path()).unwrap();
        assert_eq!(provider.get(b"key").unwrap(), Some(b"value".to_vec()));
    }
}
