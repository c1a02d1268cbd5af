use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use bytes::Bytes;

use crate::application::ports::{BlobStore, BlobStoreError};
use crate::domain::StorageKey;

/// In-memory blob store for tests and scaffold mode.
#[derive(Default)]
pub struct InMemoryBlobStore {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Bytes>> {
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }
}

#[async_trait::async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, key: &StorageKey, data: Bytes) -> Result<(), BlobStoreError> {
        self.lock().insert(key.as_str().to_string(), data);
        Ok(())
    }

    async fn fetch(&self, key: &StorageKey) -> Result<Vec<u8>, BlobStoreError> {
        self.lock()
            .get(key.as_str())
            .map(|b| b.to_vec())
            .ok_or_else(|| BlobStoreError::NotFound(key.as_str().to_string()))
    }

    async fn delete(&self, key: &StorageKey) -> Result<(), BlobStoreError> {
        self.lock().remove(key.as_str());
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &StorageKey) -> Result<u64, BlobStoreError> {
        let mut objects = self.lock();
        let before = objects.len();
        objects.retain(|k, _| !k.starts_with(prefix.as_str()));
        Ok((before - objects.len()) as u64)
    }

    async fn head(&self, key: &StorageKey) -> Result<u64, BlobStoreError> {
        self.lock()
            .get(key.as_str())
            .map(|b| b.len() as u64)
            .ok_or_else(|| BlobStoreError::NotFound(key.as_str().to_string()))
    }
}
