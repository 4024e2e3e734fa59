//! Live stream state machine
//!
//! `scheduled -> starting -> live -> ended`, with `cancelled` reachable from
//! `scheduled` and `starting`. Host actions and provider webhooks both land
//! here. A request that is not permitted from the current status is a logged
//! no-op returning `Ok(None)`; successful changes come back as
//! [`StreamTransition`] values for the caller to hand to a [`StreamNotifier`].

use async_trait::async_trait;
use chrono::Utc;
use sportisode_core::models::{LiveStream, NewLiveStream, StreamStatus, StreamTransition};
use sportisode_core::AppError;
use sportisode_db::{StoreError, StreamStore};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::broadcast::{BroadcastError, BroadcastProvider};

const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Live stream {0} not found")]
    NotFound(Uuid),

    #[error("Only the host may {0} this stream")]
    NotHost(&'static str),

    #[error("Viewer is not allowed on this private stream")]
    NotAllowed,

    #[error("Invalid stream: {0}")]
    Invalid(String),

    #[error(transparent)]
    Broadcast(#[from] BroadcastError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::NotFound(_) => AppError::NotFound(err.to_string()),
            LifecycleError::NotHost(_) | LifecycleError::NotAllowed => {
                AppError::Forbidden(err.to_string())
            }
            LifecycleError::Invalid(msg) => AppError::InvalidInput(msg),
            LifecycleError::Broadcast(e) => e.into(),
            LifecycleError::Store(e) => e.into(),
        }
    }
}

/// Fan-out collaborator for stream transitions (followers, status channels).
#[async_trait]
pub trait StreamNotifier: Send + Sync {
    async fn notify(&self, transition: &StreamTransition);
}

/// Notifier that only records transitions in the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl StreamNotifier for LoggingNotifier {
    async fn notify(&self, transition: &StreamTransition) {
        tracing::info!(
            stream_id = %transition.stream_id,
            host_id = %transition.host_id,
            from = %transition.from,
            to = %transition.to,
            "Stream status changed"
        );
    }
}

#[derive(Clone)]
pub struct StreamLifecycle {
    store: Arc<dyn StreamStore>,
    provider: Arc<dyn BroadcastProvider>,
}

impl StreamLifecycle {
    pub fn new(store: Arc<dyn StreamStore>, provider: Arc<dyn BroadcastProvider>) -> Self {
        Self { store, provider }
    }

    pub fn store(&self) -> &Arc<dyn StreamStore> {
        &self.store
    }

    /// Allocate a remote live stream and persist it as `scheduled`.
    ///
    /// Nothing is stored when the provider call fails. If the insert fails the
    /// remote stream is released again.
    #[tracing::instrument(skip(self, new), fields(host_id = %host_id))]
    pub async fn create(
        &self,
        host_id: &str,
        new: NewLiveStream,
    ) -> Result<LiveStream, LifecycleError> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(LifecycleError::Invalid("title must not be empty".to_string()));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(LifecycleError::Invalid(format!(
                "title must be at most {} characters",
                MAX_TITLE_LEN
            )));
        }

        let session = self.provider.create_live_stream(title).await?;

        let now = Utc::now();
        let stream = LiveStream {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: new.description,
            host_id: host_id.to_string(),
            stream_key: session.stream_key,
            provider_stream_id: session.provider_id,
            ingest_url: session.ingest_url,
            playback_url: session.playback_url,
            status: StreamStatus::Scheduled,
            scheduled_start: new.scheduled_start,
            actual_start: None,
            actual_end: None,
            viewer_count: 0,
            peak_viewers: 0,
            is_private: new.is_private,
            allowed_viewers: new.allowed_viewers,
            tags: new.tags,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.store.insert(&stream).await {
            if let Err(cleanup) = self
                .provider
                .delete_live_stream(&stream.provider_stream_id)
                .await
            {
                tracing::warn!(
                    provider_stream_id = %stream.provider_stream_id,
                    error = %cleanup,
                    "Failed to release remote live stream after insert failure"
                );
            }
            return Err(e.into());
        }

        tracing::info!(stream_id = %stream.id, "Live stream scheduled");
        Ok(stream)
    }

    pub async fn get(&self, id: Uuid) -> Result<LiveStream, LifecycleError> {
        self.store
            .get(id)
            .await?
            .ok_or(LifecycleError::NotFound(id))
    }

    async fn hosted(
        &self,
        id: Uuid,
        host_id: &str,
        action: &'static str,
    ) -> Result<LiveStream, LifecycleError> {
        let stream = self.get(id).await?;
        if !stream.is_host(host_id) {
            return Err(LifecycleError::NotHost(action));
        }
        Ok(stream)
    }

    /// Host marks the stream as about to go live.
    pub async fn mark_starting(
        &self,
        id: Uuid,
        host_id: &str,
    ) -> Result<Option<StreamTransition>, LifecycleError> {
        let stream = self.hosted(id, host_id, "prepare").await?;
        self.apply(&stream, StreamStatus::Starting).await
    }

    pub async fn start(
        &self,
        id: Uuid,
        host_id: &str,
    ) -> Result<Option<StreamTransition>, LifecycleError> {
        let stream = self.hosted(id, host_id, "start").await?;
        self.apply(&stream, StreamStatus::Live).await
    }

    pub async fn end(
        &self,
        id: Uuid,
        host_id: &str,
    ) -> Result<Option<StreamTransition>, LifecycleError> {
        let stream = self.hosted(id, host_id, "end").await?;
        self.apply(&stream, StreamStatus::Ended).await
    }

    pub async fn cancel(
        &self,
        id: Uuid,
        host_id: &str,
    ) -> Result<Option<StreamTransition>, LifecycleError> {
        let stream = self.hosted(id, host_id, "cancel").await?;
        self.apply(&stream, StreamStatus::Cancelled).await
    }

    /// Provider reports the encoder connected.
    pub async fn provider_connected(
        &self,
        stream: &LiveStream,
    ) -> Result<Option<StreamTransition>, LifecycleError> {
        self.apply(stream, StreamStatus::Live).await
    }

    /// Provider reports the encoder gone (disconnect or idle timeout).
    pub async fn provider_disconnected(
        &self,
        stream: &LiveStream,
    ) -> Result<Option<StreamTransition>, LifecycleError> {
        self.apply(stream, StreamStatus::Ended).await
    }

    pub async fn update_playback(
        &self,
        id: Uuid,
        playback_id: &str,
    ) -> Result<(), LifecycleError> {
        let url = self.provider.playback_url(playback_id);
        self.store.set_playback_url(id, &url).await?;
        Ok(())
    }

    /// Count a viewer in. Returns the updated stream, or `None` when the stream
    /// is not accepting viewers.
    pub async fn record_viewer_joined(
        &self,
        id: Uuid,
        viewer_id: &str,
    ) -> Result<Option<LiveStream>, LifecycleError> {
        let stream = self.get(id).await?;
        if !stream.can_view(viewer_id) {
            return Err(LifecycleError::NotAllowed);
        }
        let updated = self.store.adjust_viewers(id, 1).await?;
        if updated.is_none() {
            tracing::debug!(stream_id = %id, status = %stream.status, "Viewer join ignored");
        }
        Ok(updated)
    }

    pub async fn record_viewer_left(&self, id: Uuid) -> Result<Option<LiveStream>, LifecycleError> {
        let updated = self.store.adjust_viewers(id, -1).await?;
        if updated.is_none() {
            tracing::debug!(stream_id = %id, "Viewer leave ignored");
        }
        Ok(updated)
    }

    pub async fn can_view(&self, id: Uuid, viewer_id: &str) -> Result<bool, LifecycleError> {
        Ok(self.get(id).await?.can_view(viewer_id))
    }

    async fn apply(
        &self,
        stream: &LiveStream,
        to: StreamStatus,
    ) -> Result<Option<StreamTransition>, LifecycleError> {
        let from = stream.status;
        if !from.can_transition_to(to) {
            tracing::info!(
                stream_id = %stream.id,
                from = %from,
                to = %to,
                "Stream transition not permitted, ignoring"
            );
            return Ok(None);
        }

        let at = Utc::now();
        match self.store.transition(stream.id, from, to, at).await? {
            Some(updated) => Ok(Some(StreamTransition {
                stream_id: updated.id,
                host_id: updated.host_id,
                from,
                to,
                at,
            })),
            None => {
                // another writer moved the stream first
                tracing::debug!(stream_id = %stream.id, to = %to, "Lost stream transition race");
                Ok(None)
            }
        }
    }
}
