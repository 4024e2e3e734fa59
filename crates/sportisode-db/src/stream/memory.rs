use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sportisode_core::models::{LiveStream, StreamStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::StreamStore;
use crate::{StoreError, StoreResult};

#[derive(Clone, Default)]
pub struct InMemoryStreamStore {
    streams: Arc<RwLock<HashMap<Uuid, LiveStream>>>,
}

impl InMemoryStreamStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.streams.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.streams.read().await.is_empty()
    }
}

#[async_trait]
impl StreamStore for InMemoryStreamStore {
    async fn insert(&self, stream: &LiveStream) -> StoreResult<()> {
        let mut streams = self.streams.write().await;
        let clash = streams.values().any(|s| {
            s.id == stream.id
                || s.stream_key == stream.stream_key
                || s.provider_stream_id == stream.provider_stream_id
        });
        if clash {
            return Err(StoreError::Conflict(format!(
                "Live stream {} collides with an existing stream",
                stream.id
            )));
        }
        streams.insert(stream.id, stream.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<LiveStream>> {
        Ok(self.streams.read().await.get(&id).cloned())
    }

    async fn find_by_provider_id(
        &self,
        provider_stream_id: &str,
    ) -> StoreResult<Option<LiveStream>> {
        Ok(self
            .streams
            .read()
            .await
            .values()
            .find(|s| s.provider_stream_id == provider_stream_id)
            .cloned())
    }

    async fn transition(
        &self,
        id: Uuid,
        expected: StreamStatus,
        new: StreamStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<LiveStream>> {
        let mut streams = self.streams.write().await;
        let stream = streams
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Live stream {}", id)))?;
        if stream.status != expected || !expected.can_transition_to(new) {
            return Ok(None);
        }
        stream.status = new;
        match new {
            StreamStatus::Live => stream.actual_start = Some(at),
            StreamStatus::Ended => stream.actual_end = Some(at),
            _ => {}
        }
        stream.updated_at = Utc::now();
        Ok(Some(stream.clone()))
    }

    async fn set_playback_url(&self, id: Uuid, playback_url: &str) -> StoreResult<()> {
        let mut streams = self.streams.write().await;
        let stream = streams
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Live stream {}", id)))?;
        stream.playback_url = Some(playback_url.to_string());
        stream.updated_at = Utc::now();
        Ok(())
    }

    async fn adjust_viewers(&self, id: Uuid, delta: i32) -> StoreResult<Option<LiveStream>> {
        let mut streams = self.streams.write().await;
        let stream = streams
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Live stream {}", id)))?;
        if !stream.status.accepts_viewers() {
            return Ok(None);
        }
        stream.viewer_count = stream.viewer_count.saturating_add(delta).max(0);
        stream.peak_viewers = stream.peak_viewers.max(stream.viewer_count);
        stream.updated_at = Utc::now();
        Ok(Some(stream.clone()))
    }
}
