use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as StorePath;
use object_store::{ObjectStore, PutPayload};

use crate::application::ports::{BlobStore, BlobStoreError};
use crate::config::StorageSettings;
use crate::domain::StorageKey;

pub struct S3BlobStore {
    inner: Arc<dyn ObjectStore>,
}

impl S3BlobStore {
    pub fn new(settings: &StorageSettings) -> Result<Self, BlobStoreError> {
        let bucket = settings
            .s3_bucket
            .as_deref()
            .ok_or_else(|| BlobStoreError::UploadFailed("s3_bucket required".into()))?;

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);

        if let Some(region) = &settings.s3_region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &settings.s3_endpoint {
            // MinIO and friends speak plain HTTP on custom endpoints.
            builder = builder.with_endpoint(endpoint).with_allow_http(true);
        }
        if let Some(access_key_id) = &settings.s3_access_key_id {
            builder = builder.with_access_key_id(access_key_id);
        }
        if let Some(secret) = &settings.s3_secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }

        let store = builder
            .build()
            .map_err(|e| BlobStoreError::UploadFailed(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(store),
        })
    }
}

#[async_trait::async_trait]
impl BlobStore for S3BlobStore {
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
