use crate::error::{BlobStoreError, BlobStoreResult};
use crate::{validate_path, FileStore};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Keeps files in memory. Used in tests and for ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of a stored file.
    pub fn read(&self, path: &str) -> BlobStoreResult<Vec<u8>> {
        self.files()?
            .get(path)
            .cloned()
            .ok_or_else(|| BlobStoreError::NotFound(path.to_string()))
    }

    /// Paths of all stored files, sorted.
    pub fn paths(&self) -> BlobStoreResult<Vec<String>> {
        Ok(self.files()?.keys().cloned().collect())
    }

    fn files(&self) -> BlobStoreResult<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.files
            .lock()
            .map_err(|_| BlobStoreError::Storage("file map lock poisoned".into()))
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn write(&self, path: &str, bytes: &[u8]) -> BlobStoreResult<()> {
        validate_path(path)?;
        self.files()?.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, path: &str) -> BlobStoreResult<()> {
        self.files()?
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| BlobStoreError::NotFound(path.to_string()))
    }

    async fn exists(&self, path: &str) -> BlobStoreResult<bool> {
        Ok(self.files()?.contains_key(path))
    }
}
