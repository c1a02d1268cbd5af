use std::path::PathBuf;
use std::sync::Arc;

use crate::application::ports::{BlobStore, BlobStoreError};
use crate::config::{StorageProviderSetting, StorageSettings};

use super::local_store::LocalBlobStore;
use super::s3_store::S3BlobStore;

pub struct BlobStoreFactory;

impl BlobStoreFactory {
    pub fn create(settings: &StorageSettings) -> Result<Arc<dyn BlobStore>, BlobStoreError> {
        match settings.provider {
            StorageProviderSetting::Local => {
                let path = PathBuf::from(&settings.local_path);
                let store = LocalBlobStore::new(path)?;
                Ok(Arc::new(store))
            }
            StorageProviderSetting::S3 => {
                let store = S3BlobStore::new(settings)?;
                Ok(Arc::new(store))
            }
        }
    }
}
