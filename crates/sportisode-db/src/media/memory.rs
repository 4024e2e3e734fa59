use async_trait::async_trait;
use chrono::Utc;
use sportisode_core::models::{
    MediaAsset, MediaDimensions, MediaVariant, NewMediaVariant, ProcessingStatus, VariantType,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::MediaJobStore;
use crate::{StoreError, StoreResult};

#[derive(Default)]
struct Inner {
    assets: HashMap<Uuid, MediaAsset>,
    variants: Vec<MediaVariant>,
}

/// Process-local store used by tests and when no database is configured.
#[derive(Clone, Default)]
pub struct InMemoryMediaJobStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryMediaJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every variant row including superseded ones.
    pub async fn all_variants(&self, asset_id: Uuid) -> Vec<MediaVariant> {
        self.inner
            .read()
            .await
            .variants
            .iter()
            .filter(|v| v.asset_id == asset_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MediaJobStore for InMemoryMediaJobStore {
    async fn create_asset(&self, asset: &MediaAsset) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.assets.contains_key(&asset.id) {
            return Err(StoreError::Conflict(format!(
                "Media asset {} already exists",
                asset.id
            )));
        }
        inner.assets.insert(asset.id, asset.clone());
        Ok(())
    }

    async fn get_asset(&self, id: Uuid) -> StoreResult<Option<MediaAsset>> {
        Ok(self.inner.read().await.assets.get(&id).cloned())
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: ProcessingStatus,
        new: ProcessingStatus,
        error_message: Option<&str>,
    ) -> StoreResult<bool> {
        if !expected.can_transition_to(new) {
            return Ok(false);
        }
        let mut inner = self.inner.write().await;
        let asset = inner
            .assets
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Media asset {}", id)))?;
        if asset.processing_status != expected {
            return Ok(false);
        }
        asset.processing_status = new;
        if new == ProcessingStatus::Failed {
            asset.error_message = error_message.map(str::to_string);
        }
        asset.updated_at = Utc::now();
        Ok(true)
    }

    async fn record_dimensions(&self, id: Uuid, dimensions: MediaDimensions) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let asset = inner
            .assets
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Media asset {}", id)))?;
        asset.width = dimensions.width.or(asset.width);
        asset.height = dimensions.height.or(asset.height);
        asset.duration = dimensions.duration.or(asset.duration);
        asset.updated_at = Utc::now();
        Ok(())
    }

    async fn set_rendition_url(
        &self,
        id: Uuid,
        variant_type: VariantType,
        url: &str,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let asset = inner
            .assets
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Media asset {}", id)))?;
        asset.set_rendition_url(variant_type, url.to_string());
        asset.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_variant(&self, variant: NewMediaVariant) -> StoreResult<MediaVariant> {
        let mut inner = self.inner.write().await;
        if !inner.assets.contains_key(&variant.asset_id) {
            return Err(StoreError::NotFound(format!(
                "Media asset {}",
                variant.asset_id
            )));
        }
        for existing in inner.variants.iter_mut().filter(|v| {
            !v.superseded
                && v.asset_id == variant.asset_id
                && v.variant_type == variant.variant_type
                && v.segment_index == variant.segment_index
        }) {
            existing.superseded = true;
        }
        let row = variant.into_variant();
        inner.variants.push(row.clone());
        Ok(row)
    }

    async fn list_variants(&self, asset_id: Uuid) -> StoreResult<Vec<MediaVariant>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<MediaVariant> = inner
            .variants
            .iter()
            .filter(|v| v.asset_id == asset_id && !v.superseded)
            .cloned()
            .collect();
        rows.sort_by_key(|v| (v.variant_type, v.segment_index));
        Ok(rows)
    }

    async fn find_variant(
        &self,
        asset_id: Uuid,
        variant_type: VariantType,
        segment_index: Option<i32>,
    ) -> StoreResult<Option<MediaVariant>> {
        let inner = self.inner.read().await;
        Ok(inner
            .variants
            .iter()
            .find(|v| {
                v.asset_id == asset_id
                    && !v.superseded
                    && v.variant_type == variant_type
                    && v.segment_index == segment_index
            })
            .cloned())
    }
}
