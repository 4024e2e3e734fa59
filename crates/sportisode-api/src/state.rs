//! Application state and sub-state extractors.
//!
//! AppState is split into domain sub-states so handlers extract only what they need
//! via Axum's `FromRef`.

use sportisode_core::models::MediaKind;
use sportisode_core::Config;
use sportisode_db::MediaJobStore;
use sportisode_services::{SportsDataService, StreamLifecycle, StreamNotifier, WebhookGateway};
use sportisode_storage::{LocalStorage, Storage};
use sportisode_worker::TranscodeQueue;
use std::sync::Arc;

// ----- Sub-state types -----

/// Media assets, object storage and the transcode queue.
#[derive(Clone)]
pub struct MediaState {
    pub store: Arc<dyn MediaJobStore>,
    pub storage: Arc<dyn Storage>,
    /// Set when the local backend is active; serves its self-signed URLs under `/files`.
    pub local: Option<Arc<LocalStorage>>,
    pub queue: Arc<TranscodeQueue>,
    pub limits: UploadLimits,
}

/// Allow-lists and size limits for direct uploads.
#[derive(Clone, Debug)]
pub struct UploadLimits {
    pub image_content_types: Vec<String>,
    pub video_content_types: Vec<String>,
    pub max_image_size: usize,
    pub max_video_size: usize,
}

impl UploadLimits {
    pub fn from_config(config: &Config) -> Self {
        let media = config.media();
        Self {
            image_content_types: media.allowed_image_content_types.clone(),
            video_content_types: media.allowed_video_content_types.clone(),
            max_image_size: media.max_image_size_bytes,
            max_video_size: media.max_video_size_bytes,
        }
    }

    pub fn kind_of(&self, content_type: &str) -> Option<MediaKind> {
        MediaKind::from_content_type(
            content_type,
            &self.image_content_types,
            &self.video_content_types,
        )
    }

    pub fn max_size(&self, kind: MediaKind) -> usize {
        match kind {
            MediaKind::Image => self.max_image_size,
            MediaKind::Video => self.max_video_size,
        }
    }

    /// Largest body the `/files` upload route accepts.
    pub fn max_upload_body(&self) -> usize {
        self.max_image_size.max(self.max_video_size)
    }
}

/// Live stream lifecycle, the notifier it reports to and the provider webhook gateway.
#[derive(Clone)]
pub struct StreamState {
    pub lifecycle: StreamLifecycle,
    pub notifier: Arc<dyn StreamNotifier>,
    pub webhooks: Arc<WebhookGateway>,
}

/// Third-party sports data.
#[derive(Clone)]
pub struct SportsState {
    pub sports: Arc<SportsDataService>,
}

// ----- AppState -----

/// Main application state: aggregates sub-states for dependency injection.
#[derive(Clone)]
pub struct AppState {
    pub media: MediaState,
    pub streams: StreamState,
    pub sports: SportsState,
    pub config: Config,
    pub is_production: bool,
}

// ----- FromRef for sub-state extraction -----

impl axum::extract::FromRef<Arc<AppState>> for MediaState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.media.clone()
    }
}

impl axum::extract::FromRef<Arc<AppState>> for StreamState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.streams.clone()
    }
}

impl axum::extract::FromRef<Arc<AppState>> for SportsState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.sports.clone()
    }
}
