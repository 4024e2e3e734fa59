use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use sportisode_core::BroadcastConfig;
use std::time::Duration;

use super::{BroadcastError, BroadcastProvider, BroadcastSession};

const LIVE_STREAMS_PATH: &str = "video/v1/live-streams";

#[derive(Debug, Deserialize)]
struct Envelope {
    data: LiveStreamData,
}

#[derive(Debug, Deserialize)]
struct LiveStreamData {
    id: String,
    stream_key: String,
    #[serde(default)]
    playback_ids: Vec<PlaybackId>,
}

#[derive(Debug, Deserialize)]
struct PlaybackId {
    id: String,
}

/// Mux Video live stream API, authenticated with an access token pair.
#[derive(Clone)]
pub struct MuxBroadcastClient {
    http: reqwest::Client,
    api_url: String,
    credentials: Option<(String, String)>,
    ingest_url: String,
    playback_base_url: String,
    timeout: Duration,
}

impl MuxBroadcastClient {
    pub fn new(config: &BroadcastConfig) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let credentials = match (&config.token_id, &config.token_secret) {
            (Some(id), Some(secret)) => Some((id.clone(), secret.clone())),
            _ => None,
        };
        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            credentials,
            ingest_url: config.ingest_url.clone(),
            playback_base_url: config.playback_base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    fn credentials(&self) -> Result<&(String, String), BroadcastError> {
        self.credentials.as_ref().ok_or(BroadcastError::NotConfigured)
    }
}

#[async_trait]
impl BroadcastProvider for MuxBroadcastClient {
    #[tracing::instrument(skip(self))]
    async fn create_live_stream(&self, title: &str) -> Result<BroadcastSession, BroadcastError> {
        let (token_id, token_secret) = self.credentials()?;
        let body = json!({
            "playback_policy": ["public"],
            "new_asset_settings": { "playback_policy": ["public"] },
            "passthrough": title,
        });

        let response = self
            .http
            .post(format!("{}/{}", self.api_url, LIVE_STREAMS_PATH))
            .basic_auth(token_id, Some(token_secret))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| BroadcastError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Broadcast provider refused live stream");
            return Err(BroadcastError::Rejected(status.as_u16()));
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| BroadcastError::Decode(e.to_string()))?;
        let data = envelope.data;

        tracing::info!(provider_stream_id = %data.id, "Created remote live stream");

        Ok(BroadcastSession {
            playback_url: data.playback_ids.first().map(|p| self.playback_url(&p.id)),
            provider_id: data.id,
            stream_key: data.stream_key,
            ingest_url: self.ingest_url.clone(),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn delete_live_stream(&self, provider_id: &str) -> Result<(), BroadcastError> {
        let (token_id, token_secret) = self.credentials()?;
        let response = self
            .http
            .delete(format!("{}/{}/{}", self.api_url, LIVE_STREAMS_PATH, provider_id))
            .basic_auth(token_id, Some(token_secret))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| BroadcastError::Transport(e.to_string()))?;

        let status = response.status();
        // already gone counts as deleted
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            tracing::info!(provider_stream_id = %provider_id, "Deleted remote live stream");
            Ok(())
        } else {
            Err(BroadcastError::Rejected(status.as_u16()))
        }
    }

    fn playback_url(&self, playback_id: &str) -> String {
        format!("{}/{}.m3u8", self.playback_base_url, playback_id)
    }
}
