//! Broadcast provider client
//!
//! The provider owns RTMP ingest and HLS playback. Sportisode only allocates and
//! releases remote live streams; state changes come back through webhooks.

mod mux;

#[cfg(any(test, feature = "test-helpers"))]
mod fake;

pub use mux::MuxBroadcastClient;

#[cfg(any(test, feature = "test-helpers"))]
pub use fake::FakeBroadcastProvider;

use async_trait::async_trait;
use sportisode_core::AppError;
use thiserror::Error;

/// A remote live stream as allocated by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastSession {
    pub provider_id: String,
    pub stream_key: String,
    pub ingest_url: String,
    pub playback_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("Broadcast provider credentials are not configured")]
    NotConfigured,

    #[error("Broadcast provider unreachable: {0}")]
    Transport(String),

    #[error("Broadcast provider rejected the request with HTTP {0}")]
    Rejected(u16),

    #[error("Unexpected broadcast provider response: {0}")]
    Decode(String),
}

impl From<BroadcastError> for AppError {
    fn from(err: BroadcastError) -> Self {
        match err {
            BroadcastError::NotConfigured | BroadcastError::Transport(_) => {
                AppError::IntegrationUnavailable(err.to_string())
            }
            BroadcastError::Rejected(_) | BroadcastError::Decode(_) => {
                AppError::RemoteRejected(err.to_string())
            }
        }
    }
}

#[async_trait]
pub trait BroadcastProvider: Send + Sync {
    async fn create_live_stream(&self, title: &str) -> Result<BroadcastSession, BroadcastError>;

    async fn delete_live_stream(&self, provider_id: &str) -> Result<(), BroadcastError>;

    /// Public HLS URL for a playback id reported by the provider
    fn playback_url(&self, playback_id: &str) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use sportisode_core::ErrorMetadata;

    #[test]
    fn maps_to_app_error() {
        let down: AppError = BroadcastError::Transport("timeout".to_string()).into();
        assert_eq!(down.http_status_code(), 503);
        let rejected: AppError = BroadcastError::Rejected(422).into();
        assert_eq!(rejected.http_status_code(), 502);
    }
}
