//! Media asset and variant persistence.

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::InMemoryMediaJobStore;
#[cfg(feature = "postgres")]
pub use postgres::PgMediaJobStore;

use async_trait::async_trait;
use sportisode_core::models::{
    MediaAsset, MediaDimensions, MediaVariant, NewMediaVariant, ProcessingStatus, VariantType,
};
use uuid::Uuid;

use crate::StoreResult;

/// Durable record of assets and their renditions.
///
/// Status changes go through [`MediaJobStore::compare_and_set_status`] so that two
/// workers racing on one asset cannot both win.
#[async_trait]
pub trait MediaJobStore: Send + Sync {
    /// Insert a new asset; fails with `Conflict` when the id already exists.
    async fn create_asset(&self, asset: &MediaAsset) -> StoreResult<()>;

    async fn get_asset(&self, id: Uuid) -> StoreResult<Option<MediaAsset>>;

    /// Move `expected -> new` atomically. Returns `false` when the current status
    /// was not `expected` or the transition is not forward. `error_message` is
    /// stored alongside a `failed` status.
    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: ProcessingStatus,
        new: ProcessingStatus,
        error_message: Option<&str>,
    ) -> StoreResult<bool>;

    async fn record_dimensions(&self, id: Uuid, dimensions: MediaDimensions) -> StoreResult<()>;

    /// Set the asset-level URL for a rendition (no-op for HLS renditions).
    async fn set_rendition_url(
        &self,
        id: Uuid,
        variant_type: VariantType,
        url: &str,
    ) -> StoreResult<()>;

    /// Record a rendition. An existing current row with the same
    /// (asset, type, segment index) is marked superseded.
    async fn insert_variant(&self, variant: NewMediaVariant) -> StoreResult<MediaVariant>;

    /// Current (non-superseded) variants, ordered by type then segment index.
    async fn list_variants(&self, asset_id: Uuid) -> StoreResult<Vec<MediaVariant>>;

    async fn find_variant(
        &self,
        asset_id: Uuid,
        variant_type: VariantType,
        segment_index: Option<i32>,
    ) -> StoreResult<Option<MediaVariant>>;
}
