//! Storage setup and initialization

use anyhow::Result;
use sportisode_core::Config;
use sportisode_storage::{create_storage, StorageHandle};

/// Build the configured object storage backend.
pub async fn setup_storage(config: &Config) -> Result<StorageHandle> {
    tracing::info!("Initializing storage abstraction...");
    let handle = create_storage(config).await?;
    tracing::info!(
        backend = ?handle.storage.backend_type(),
        self_signed_urls = handle.local.is_some(),
        "Storage abstraction initialized successfully"
    );
    Ok(handle)
}
