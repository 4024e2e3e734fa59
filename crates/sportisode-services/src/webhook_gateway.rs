//! Inbound broadcast provider webhooks
//!
//! The raw body is authenticated before it is parsed. Recognised events drive
//! the [`StreamLifecycle`]; anything else is acknowledged and dropped so the
//! provider does not retry it.

use serde::Deserialize;
use sportisode_core::models::StreamTransition;
use sportisode_core::AppError;
use sportisode_infra::webhook::DEFAULT_TOLERANCE_SECS;
use sportisode_infra::{verify_signature, SignatureError};
use std::sync::Arc;
use thiserror::Error;

use crate::lifecycle::{LifecycleError, StreamLifecycle, StreamNotifier};

pub const EVENT_CONNECTED: &str = "video.live_stream.connected";
pub const EVENT_DISCONNECTED: &str = "video.live_stream.disconnected";
pub const EVENT_IDLE_TIMEOUT: &str = "video.live_stream.idle_timeout_reached";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error("Invalid webhook payload: {0}")]
    MalformedPayload(String),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl From<WebhookError> for AppError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::Signature(e) => e.into(),
            WebhookError::MalformedPayload(msg) => AppError::BadRequest(msg),
            WebhookError::Lifecycle(e) => e.into(),
        }
    }
}

/// What a delivered event amounted to
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    /// The stream changed status; already forwarded to the notifier
    Transitioned(StreamTransition),
    /// Known event for a known stream, but its status did not permit the change
    Unchanged,
    /// Unknown event type, missing id or unknown stream
    Ignored,
}

#[derive(Debug, Deserialize)]
struct ProviderEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: EventData,
}

#[derive(Debug, Default, Deserialize)]
struct EventData {
    id: Option<String>,
    #[serde(default)]
    playback_ids: Vec<PlaybackId>,
}

#[derive(Debug, Deserialize)]
struct PlaybackId {
    id: String,
}

#[derive(Clone)]
pub struct WebhookGateway {
    lifecycle: StreamLifecycle,
    notifier: Arc<dyn StreamNotifier>,
    secret: Option<String>,
    tolerance_secs: i64,
    production: bool,
}

impl WebhookGateway {
    pub fn new(
        lifecycle: StreamLifecycle,
        notifier: Arc<dyn StreamNotifier>,
        secret: Option<String>,
        production: bool,
    ) -> Self {
        Self {
            lifecycle,
            notifier,
            secret: secret.filter(|s| !s.is_empty()),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
            production,
        }
    }

    pub fn with_tolerance_secs(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    pub async fn handle(
        &self,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<WebhookOutcome, WebhookError> {
        self.handle_at(signature, body, chrono::Utc::now().timestamp())
            .await
    }

    /// Same as [`handle`](Self::handle) with an explicit clock (unix seconds).
    #[tracing::instrument(skip_all)]
    pub async fn handle_at(
        &self,
        signature: Option<&str>,
        body: &[u8],
        now: i64,
    ) -> Result<WebhookOutcome, WebhookError> {
        match &self.secret {
            Some(secret) => {
                if let Err(e) = verify_signature(secret, signature, body, now, self.tolerance_secs) {
                    tracing::warn!(error = %e, "Rejected broadcast webhook");
                    return Err(e.into());
                }
            }
            None if self.production => {
                tracing::error!("Broadcast webhook accepted without signature check: no secret configured");
            }
            None => {
                tracing::warn!("Broadcast webhook accepted without signature check: no secret configured");
            }
        }

        let event: ProviderEvent = serde_json::from_slice(body)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

        let connected = match event.kind.as_str() {
            EVENT_CONNECTED => true,
            EVENT_DISCONNECTED | EVENT_IDLE_TIMEOUT => false,
            other => {
                tracing::info!(event_type = %other, "Ignoring unhandled broadcast event");
                return Ok(WebhookOutcome::Ignored);
            }
        };

        let Some(provider_id) = event.data.id.as_deref() else {
            tracing::warn!(event_type = %event.kind, "Broadcast event without stream id");
            return Ok(WebhookOutcome::Ignored);
        };

        let Some(stream) = self
            .lifecycle
            .store()
            .find_by_provider_id(provider_id)
            .await
            .map_err(LifecycleError::from)?
        else {
            tracing::warn!(provider_stream_id = %provider_id, "No live stream for broadcast event");
            return Ok(WebhookOutcome::Ignored);
        };

        let transition = if connected {
            let transition = self.lifecycle.provider_connected(&stream).await?;
            // Playback only changes alongside an accepted go-live
            if let (Some(_), Some(playback)) = (&transition, event.data.playback_ids.first()) {
                self.lifecycle.update_playback(stream.id, &playback.id).await?;
            }
            transition
        } else {
            self.lifecycle.provider_disconnected(&stream).await?
        };

        match transition {
            Some(transition) => {
                tracing::info!(
                    stream_id = %stream.id,
                    event_type = %event.kind,
                    to = %transition.to,
                    "Applied broadcast event"
                );
                self.notifier.notify(&transition).await;
                Ok(WebhookOutcome::Transitioned(transition))
            }
            None => Ok(WebhookOutcome::Unchanged),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::FakeBroadcastProvider;
    use async_trait::async_trait;
    use sportisode_core::models::{NewLiveStream, StreamStatus};
    use sportisode_db::InMemoryStreamStore;
    use sportisode_infra::webhook::signature_header;
    use std::sync::Mutex;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_760_000_000;

    #[derive(Default)]
    struct RecordingNotifier {
        seen: Mutex<Vec<StreamTransition>>,
    }

    #[async_trait]
    impl StreamNotifier for RecordingNotifier {
        async fn notify(&self, transition: &StreamTransition) {
            self.seen.lock().unwrap().push(transition.clone());
        }
    }

    async fn setup(
        secret: Option<&str>,
    ) -> (WebhookGateway, StreamLifecycle, Arc<RecordingNotifier>, uuid::Uuid) {
        let store = Arc::new(InMemoryStreamStore::new());
        let lifecycle = StreamLifecycle::new(store, Arc::new(FakeBroadcastProvider::new()));
        let stream = lifecycle
            .create(
                "host",
                NewLiveStream {
                    title: "Derby".to_string(),
                    description: String::new(),
                    scheduled_start: None,
                    is_private: false,
                    allowed_viewers: vec![],
                    tags: vec![],
                },
            )
            .await
            .unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let gateway = WebhookGateway::new(
            lifecycle.clone(),
            notifier.clone(),
            secret.map(str::to_string),
            false,
        );
        (gateway, lifecycle, notifier, stream.id)
    }

    fn event(kind: &str, provider_id: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "type": kind,
            "data": { "id": provider_id, "playback_ids": [{ "id": "pb-live", "policy": "public" }] }
        }))
        .unwrap()
    }

    fn signed(body: &[u8]) -> String {
        signature_header(SECRET, NOW, body).unwrap()
    }

    #[tokio::test]
    async fn signed_connected_event_starts_stream() {
        let (gateway, lifecycle, notifier, id) = setup(Some(SECRET)).await;
        let body = event(EVENT_CONNECTED, "fake-ls-1");

        let outcome = gateway
            .handle_at(Some(&signed(&body)), &body, NOW)
            .await
            .unwrap();
        assert!(matches!(outcome, WebhookOutcome::Transitioned(ref t) if t.to == StreamStatus::Live));

        let stream = lifecycle.get(id).await.unwrap();
        assert_eq!(stream.status, StreamStatus::Live);
        assert!(stream.actual_start.is_some());
        assert_eq!(
            stream.playback_url.as_deref(),
            Some("https://playback.test/pb-live.m3u8")
        );
        assert_eq!(notifier.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn flipped_signature_byte_is_rejected_without_mutation() {
        let (gateway, lifecycle, notifier, id) = setup(Some(SECRET)).await;
        let body = event(EVENT_CONNECTED, "fake-ls-1");
        let mut header = signed(&body);
        let last = header.pop().unwrap();
        header.push(if last == '0' { '1' } else { '0' });

        let err = gateway
            .handle_at(Some(&header), &body, NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::Signature(SignatureError::Mismatch)));
        assert!(matches!(AppError::from(err), AppError::Unauthorized(_)));
        assert_eq!(
            lifecycle.get(id).await.unwrap().status,
            StreamStatus::Scheduled
        );
        assert!(notifier.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_signature_is_rejected_before_parsing() {
        let (gateway, _, _, _) = setup(Some(SECRET)).await;
        let err = gateway.handle_at(None, b"not json", NOW).await.unwrap_err();
        assert!(matches!(err, WebhookError::Signature(SignatureError::Missing)));
    }

    #[tokio::test]
    async fn replayed_delivery_is_rejected() {
        let (gateway, _, _, _) = setup(Some(SECRET)).await;
        let body = event(EVENT_CONNECTED, "fake-ls-1");
        let err = gateway
            .handle_at(Some(&signed(&body)), &body, NOW + 301)
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::Signature(SignatureError::Expired)));
    }

    #[tokio::test]
    async fn disconnect_and_idle_timeout_end_stream_once() {
        let (gateway, lifecycle, notifier, id) = setup(None).await;
        gateway
            .handle_at(None, &event(EVENT_CONNECTED, "fake-ls-1"), NOW)
            .await
            .unwrap();

        let first = gateway
            .handle_at(None, &event(EVENT_DISCONNECTED, "fake-ls-1"), NOW)
            .await
            .unwrap();
        assert!(matches!(first, WebhookOutcome::Transitioned(_)));
        let ended_at = lifecycle.get(id).await.unwrap().actual_end;

        let second = gateway
            .handle_at(None, &event(EVENT_IDLE_TIMEOUT, "fake-ls-1"), NOW)
            .await
            .unwrap();
        assert_eq!(second, WebhookOutcome::Unchanged);
        assert_eq!(lifecycle.get(id).await.unwrap().actual_end, ended_at);
        assert_eq!(notifier.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn late_connect_on_ended_stream_keeps_playback() {
        let (gateway, lifecycle, notifier, id) = setup(None).await;
        gateway
            .handle_at(None, &event(EVENT_CONNECTED, "fake-ls-1"), NOW)
            .await
            .unwrap();
        gateway
            .handle_at(None, &event(EVENT_DISCONNECTED, "fake-ls-1"), NOW)
            .await
            .unwrap();

        let late = serde_json::to_vec(&serde_json::json!({
            "type": EVENT_CONNECTED,
            "data": { "id": "fake-ls-1", "playback_ids": [{ "id": "pb-reconnect", "policy": "public" }] }
        }))
        .unwrap();
        let outcome = gateway.handle_at(None, &late, NOW).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::Unchanged);

        let stream = lifecycle.get(id).await.unwrap();
        assert_eq!(stream.status, StreamStatus::Ended);
        assert_eq!(
            stream.playback_url.as_deref(),
            Some("https://playback.test/pb-live.m3u8")
        );
        assert_eq!(notifier.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_events_and_streams_are_ignored() {
        let (gateway, _, notifier, _) = setup(None).await;
        let outcome = gateway
            .handle_at(None, &event("video.asset.ready", "fake-ls-1"), NOW)
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored);

        let outcome = gateway
            .handle_at(None, &event(EVENT_CONNECTED, "someone-else"), NOW)
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored);

        let outcome = gateway
            .handle_at(None, br#"{"type":"video.live_stream.connected","data":{}}"#, NOW)
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored);
        assert!(notifier.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let (gateway, _, _, _) = setup(None).await;
        let err = gateway.handle_at(None, b"{oops", NOW).await.unwrap_err();
        assert!(matches!(AppError::from(err), AppError::BadRequest(_)));
    }
}
