#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use sportisode_core::Config;
use std::sync::Arc;

/// Backend built from configuration, with the local backend kept concrete so the
/// API can verify its self-signed URLs.
#[derive(Clone)]
pub struct StorageHandle {
    pub storage: Arc<dyn Storage>,
    #[cfg(feature = "storage-local")]
    pub local: Option<Arc<LocalStorage>>,
}

/// Create a storage backend based on configuration
pub async fn create_storage(config: &Config) -> StorageResult<StorageHandle> {
    let storage_config = config.storage();

    match storage_config.backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let bucket = storage_config
                .s3_bucket
                .clone()
                .ok_or_else(|| StorageError::ConfigError("S3_BUCKET not configured".to_string()))?;
            let region = storage_config.s3_region.clone().ok_or_else(|| {
                StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
            })?;
            let endpoint = storage_config.s3_endpoint.clone();

            let storage = S3Storage::new(bucket, region, endpoint).await?;
            Ok(StorageHandle {
                storage: Arc::new(storage),
                #[cfg(feature = "storage-local")]
                local: None,
            })
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let storage = Arc::new(
                LocalStorage::new(
                    storage_config.local_storage_path.clone(),
                    storage_config.local_storage_base_url.clone(),
                    &storage_config.url_signing_secret,
                )
                .await?,
            );
            Ok(StorageHandle {
                storage: storage.clone(),
                local: Some(storage),
            })
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use sportisode_core::SportisodeConfig;

    #[tokio::test]
    async fn builds_local_backend_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut inner = SportisodeConfig::default();
        inner.storage.local_storage_path = dir.path().display().to_string();
        let config = Config(Box::new(inner));

        let handle = create_storage(&config).await.unwrap();
        assert_eq!(handle.storage.backend_type(), StorageBackend::Local);
        assert!(handle.local.is_some());
    }

    #[cfg(feature = "storage-s3")]
    #[tokio::test]
    async fn s3_backend_requires_bucket() {
        let mut inner = SportisodeConfig::default();
        inner.storage.backend = StorageBackend::S3;
        let config = Config(Box::new(inner));
        assert!(matches!(
            create_storage(&config).await,
            Err(StorageError::ConfigError(_))
        ));
    }
}
