//! Live stream persistence.

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::InMemoryStreamStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStreamStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sportisode_core::models::{LiveStream, StreamStatus};
use uuid::Uuid;

use crate::StoreResult;

#[async_trait]
pub trait StreamStore: Send + Sync {
    async fn insert(&self, stream: &LiveStream) -> StoreResult<()>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<LiveStream>>;

    async fn find_by_provider_id(&self, provider_stream_id: &str)
        -> StoreResult<Option<LiveStream>>;

    /// CAS on status: `expected -> new`, stamping `actual_start` on entry into
    /// `live` and `actual_end` on entry into `ended`. Returns the updated row, or
    /// `None` when the stored status was not `expected`.
    async fn transition(
        &self,
        id: Uuid,
        expected: StreamStatus,
        new: StreamStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<LiveStream>>;

    async fn set_playback_url(&self, id: Uuid, playback_url: &str) -> StoreResult<()>;

    /// Add `delta` to the viewer count (floored at zero) and raise the peak.
    /// Only applies while the stream accepts viewers; returns `None` otherwise.
    async fn adjust_viewers(&self, id: Uuid, delta: i32) -> StoreResult<Option<LiveStream>>;
}
