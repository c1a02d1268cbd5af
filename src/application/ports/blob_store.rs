use std::io;

use bytes::Bytes;

use crate::domain::StorageKey;

#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &StorageKey, data: Bytes) -> Result<(), BlobStoreError>;

    async fn fetch(&self, key: &StorageKey) -> Result<Vec<u8>, BlobStoreError>;

    async fn delete(&self, key: &StorageKey) -> Result<(), BlobStoreError>;

    /// Deletes every object under the prefix; returns how many were removed.
    async fn delete_prefix(&self, prefix: &StorageKey) -> Result<u64, BlobStoreError>;

    async fn head(&self, key: &StorageKey) -> Result<u64, BlobStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum BlobStoreError {
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("download failed: {0}")]
    DownloadFailed(String),
    #[error("delete failed: {0}")]
    DeleteFailed(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
