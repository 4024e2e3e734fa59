//! Service initialization
//!
//! Builds the transcode pipeline and queue, the broadcast client, the stream
//! lifecycle with its webhook gateway, and the sports data service, then
//! aggregates them into [`AppState`].

use super::database::Stores;
use crate::state::{AppState, MediaState, SportsState, StreamState, UploadLimits};
use anyhow::{Context, Result};
use sportisode_core::Config;
use sportisode_processing::{FfmpegToolkit, PipelineConfig, TranscodePipeline, VideoToolkit};
use sportisode_services::{
    BroadcastProvider, LoggingNotifier, MuxBroadcastClient, SportsDataService, StreamLifecycle,
    StreamNotifier, WebhookGateway,
};
use sportisode_storage::StorageHandle;
use sportisode_worker::{JobFinishedSender, TranscodeQueue, TranscodeQueueConfig};
use std::sync::Arc;

/// External collaborators; swapped for fakes in tests.
pub struct Collaborators {
    pub video_toolkit: Arc<dyn VideoToolkit>,
    pub broadcast: Arc<dyn BroadcastProvider>,
    pub sports: SportsDataService,
    pub notifier: Arc<dyn StreamNotifier>,
    /// Receives `(asset_id, outcome)` for every finished transcode
    pub job_finished: Option<JobFinishedSender>,
}

/// Initialize all services from configuration
pub fn initialize_services(
    config: &Config,
    stores: Stores,
    storage: StorageHandle,
) -> Result<Arc<AppState>> {
    let video_toolkit = Arc::new(
        FfmpegToolkit::from_config(config.media()).context("Failed to configure ffmpeg")?,
    );
    let broadcast = MuxBroadcastClient::new(config.broadcast())
        .context("Failed to build broadcast provider client")?;
    if !broadcast.is_configured() {
        tracing::warn!("Broadcast provider credentials missing; stream creation will be refused");
    }
    let sports = SportsDataService::from_config(config.integrations())
        .context("Failed to build sports data clients")?;
    tracing::info!(primary = %sports.primary_name(), "Sports data service initialized");

    Ok(assemble_state(
        config,
        stores,
        storage,
        Collaborators {
            video_toolkit,
            broadcast: Arc::new(broadcast),
            sports,
            notifier: Arc::new(LoggingNotifier),
            job_finished: None,
        },
    ))
}

/// Wire stores, storage and collaborators into the application state.
///
/// Spawns the transcode worker pool, so it must run inside a tokio runtime.
pub fn assemble_state(
    config: &Config,
    stores: Stores,
    storage: StorageHandle,
    collaborators: Collaborators,
) -> Arc<AppState> {
    let pipeline = TranscodePipeline::new(
        stores.media.clone(),
        storage.storage.clone(),
        collaborators.video_toolkit,
        PipelineConfig::from_media_config(config.media()),
    );
    let queue = TranscodeQueue::new_with_job_finished(
        pipeline,
        TranscodeQueueConfig {
            max_workers: config.max_concurrent_transcodes(),
        },
        collaborators.job_finished,
    );

    let lifecycle = StreamLifecycle::new(stores.streams.clone(), collaborators.broadcast);
    let broadcast_config = config.broadcast();
    let webhooks = WebhookGateway::new(
        lifecycle.clone(),
        collaborators.notifier.clone(),
        broadcast_config.webhook_secret.clone(),
        config.is_production(),
    )
    .with_tolerance_secs(i64::try_from(broadcast_config.webhook_tolerance_secs).unwrap_or(i64::MAX));

    tracing::info!(
        max_concurrent_transcodes = config.max_concurrent_transcodes(),
        webhook_signing = broadcast_config.webhook_secret.is_some(),
        "Services initialized"
    );

    Arc::new(AppState {
        media: MediaState {
            store: stores.media,
            storage: storage.storage,
            local: storage.local,
            queue: Arc::new(queue),
            limits: UploadLimits::from_config(config),
        },
        streams: StreamState {
            lifecycle,
            notifier: collaborators.notifier,
            webhooks: Arc::new(webhooks),
        },
        sports: SportsState {
            sports: Arc::new(collaborators.sports),
        },
        config: config.clone(),
        is_production: config.is_production(),
    })
}
