use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use object_store::local::LocalFileSystem;
use object_store::path::Path as StorePath;
use object_store::{ObjectStore, PutPayload};

use crate::application::ports::{BlobStore, BlobStoreError};
use crate::domain::StorageKey;

pub struct LocalBlobStore {
    inner: Arc<LocalFileSystem>,
}

impl LocalBlobStore {
    pub fn new(base_path: PathBuf) -> Result<Self, BlobStoreError> {
        std::fs::create_dir_all(&base_path).map_err(BlobStoreError::Io)?;
        let fs = LocalFileSystem::new_with_prefix(base_path)
            .map_err(|e| BlobStoreError::UploadFailed(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(fs),
        })
    }
}

#[async_trait::async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &StorageKey, data: Bytes) -> Result<(), BlobStoreError> {
        let path = StorePath::from(key.as_str());
        self.inner
            .put(&path, PutPayload::from(data))
            .await
            .map_err(|e| BlobStoreError::UploadFailed(e.to_string()))?;
        Ok(())
    }

    async fn fetch(&self, key: &StorageKey) -> Result<Vec<u8>, BlobStoreError> {
        let path = StorePath::from(key.as_str());
        let result = self
            .inner
            .get(&path)
            .await
            .map_err(|e| BlobStoreError::NotFound(e.to_string()))?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| BlobStoreError::DownloadFailed(e.to_string()))?;

        Ok(bytes.to_vec())
    }

    async fn delete(&self, key: &StorageKey) -> Result<(), BlobStoreError> {
        let path = StorePath::from(key.as_str());
        self.inner
            .delete(&path)
            .await
            .map_err(|e| BlobStoreError::DeleteFailed(e.to_string()))
    }

    async fn delete_prefix(&self, prefix: &StorageKey) -> Result<u64, BlobStoreError> {
        let prefix_path = StorePath::from(prefix.as_str().trim_end_matches('/'));
        let mut listing = self.inner.list(Some(&prefix_path));
        let mut removed = 0u64;

        while let Some(meta) = listing.next().await {
            let meta = meta.map_err(|e| BlobStoreError::DeleteFailed(e.to_string()))?;
            self.inner
                .delete(&meta.location)
                .await
                .map_err(|e| BlobStoreError::DeleteFailed(e.to_string()))?;
            removed += 1;
        }

        Ok(removed)
    }

    async fn head(&self, key: &StorageKey) -> Result<u64, BlobStoreError> {
        let path = StorePath::from(key.as_str());
        let meta = self
            .inner
            .head(&path)
            .await
            .map_err(|e| BlobStoreError::NotFound(e.to_string()))?;
        Ok(meta.size as u64)
    }
}
