//! In-memory storage backend
//!
//! Used by tests across the workspace. Uploads whose key contains a configured
//! fragment fail, which lets callers exercise partial-failure paths.

use crate::keys::validate_key;
use crate::traits::{ByteStream, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Clone, Default)]
pub struct InMemoryStorage {
    files: Arc<Mutex<HashMap<String, (Vec<u8>, String)>>>,
    fail_on: Arc<Mutex<Vec<String>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn files(&self) -> MutexGuard<'_, HashMap<String, (Vec<u8>, String)>> {
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn url(key: &str) -> String {
        format!("memory://{}", key)
    }

    /// Seed an object directly.
    pub fn put(&self, key: &str, data: Vec<u8>, content_type: &str) {
        self.files()
            .insert(key.to_string(), (data, content_type.to_string()));
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.files().get(key).map(|(data, _)| data.clone())
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.files().get(key).map(|(_, ct)| ct.clone())
    }

    /// Keys currently stored, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.files().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Make every upload whose key contains `fragment` fail.
    pub fn fail_uploads_containing(&self, fragment: &str) {
        self.fail_on
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(fragment.to_string());
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String> {
        validate_key(storage_key)?;
        let should_fail = self
            .fail_on
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|f| storage_key.contains(f.as_str()));
        if should_fail {
            return Err(StorageError::UploadFailed(format!(
                "injected failure for {}",
                storage_key
            )));
        }
        self.put(storage_key, data, content_type);
        Ok(Self::url(storage_key))
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        self.get(storage_key)
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))
    }

    async fn download_stream(&self, storage_key: &str) -> StorageResult<ByteStream> {
        let data = self.download(storage_key).await?;
        let chunks: Vec<Result<Bytes, StorageError>> = data
            .chunks(64 * 1024)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        self.files().remove(storage_key);
        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        Ok(self.files().contains_key(storage_key))
    }

    async fn content_length(&self, storage_key: &str) -> StorageResult<u64> {
        self.files()
            .get(storage_key)
            .map(|(data, _)| data.len() as u64)
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))
    }

    async fn presigned_get_url(
        &self,
        storage_key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        validate_key(storage_key)?;
        Ok(format!(
            "{}?method=GET&expires_in={}",
            Self::url(storage_key),
            expires_in.as_secs()
        ))
    }

    async fn presigned_put_url(
        &self,
        storage_key: &str,
        _content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        validate_key(storage_key)?;
        Ok(format!(
            "{}?method=PUT&expires_in={}",
            Self::url(storage_key),
            expires_in.as_secs()
        ))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
