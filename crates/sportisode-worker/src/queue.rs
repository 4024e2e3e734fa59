//! Transcode queue: in-process channel, semaphore-bounded worker pool, in-flight
//! deduplication and graceful shutdown.
//!
//! Shutdown: [`TranscodeQueue::shutdown`] stops intake, lets running jobs finish
//! within the grace period and drops jobs that never started. Those assets stay
//! `pending` and can be enqueued again.

use sportisode_core::models::ProcessingStatus;
use sportisode_db::MediaJobStore;
use sportisode_processing::{JobOutcome, TranscodePipeline};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Optional sender notified when a job finishes (tests and metrics hooks).
pub type JobFinishedSender = mpsc::UnboundedSender<(Uuid, JobOutcome)>;

#[derive(Debug, Clone)]
pub struct TranscodeQueueConfig {
    pub max_workers: usize,
}

impl Default for TranscodeQueueConfig {
    fn default() -> Self {
        Self { max_workers: 2 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// The asset is already queued or running
    AlreadyQueued,
    /// The queue has shut down
    Closed,
}

#[derive(Debug)]
struct TranscodeJob {
    asset_id: Uuid,
    storage_key: String,
}

type InFlight = Arc<Mutex<HashSet<Uuid>>>;

fn lock(in_flight: &InFlight) -> MutexGuard<'_, HashSet<Uuid>> {
    in_flight.lock().unwrap_or_else(|e| e.into_inner())
}

/// Removes the asset from the in-flight set however the job ends
struct InFlightGuard {
    in_flight: InFlight,
    asset_id: Uuid,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.in_flight).remove(&self.asset_id);
    }
}

pub struct TranscodeQueue {
    jobs_tx: mpsc::UnboundedSender<TranscodeJob>,
    shutdown_tx: mpsc::Sender<Duration>,
    in_flight: InFlight,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl TranscodeQueue {
    pub fn new(pipeline: TranscodePipeline, config: TranscodeQueueConfig) -> Self {
        Self::new_with_job_finished(pipeline, config, None)
    }

    pub fn new_with_job_finished(
        pipeline: TranscodePipeline,
        config: TranscodeQueueConfig,
        job_finished_tx: Option<JobFinishedSender>,
    ) -> Self {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let in_flight: InFlight = Arc::new(Mutex::new(HashSet::new()));

        let worker = tokio::spawn(Self::worker_pool(
            pipeline,
            config,
            jobs_rx,
            shutdown_rx,
            in_flight.clone(),
            job_finished_tx,
        ));

        Self {
            jobs_tx,
            shutdown_tx,
            in_flight,
            worker: tokio::sync::Mutex::new(Some(worker)),
        }
    }

    /// Queue an asset for processing and return immediately.
    ///
    /// Idempotent: an asset already queued or running is not queued twice, and a
    /// worker skips any asset that is no longer `pending` when it gets to it.
    #[tracing::instrument(skip(self, storage_key), fields(asset_id = %asset_id))]
    pub fn enqueue(&self, asset_id: Uuid, storage_key: impl Into<String>) -> EnqueueOutcome {
        if !lock(&self.in_flight).insert(asset_id) {
            tracing::debug!("Asset already queued");
            return EnqueueOutcome::AlreadyQueued;
        }

        let job = TranscodeJob {
            asset_id,
            storage_key: storage_key.into(),
        };
        if self.jobs_tx.send(job).is_err() {
            lock(&self.in_flight).remove(&asset_id);
            tracing::warn!("Transcode queue closed, job dropped");
            return EnqueueOutcome::Closed;
        }

        tracing::info!("Transcode job queued");
        EnqueueOutcome::Queued
    }

    /// Assets queued or running
    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }

    /// Stop intake and wait up to `grace` for running jobs.
    pub async fn shutdown(&self, grace: Duration) {
        let _ = self.shutdown_tx.send(grace).await;
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Transcode worker pool task failed");
            }
        }
    }

    async fn worker_pool(
        pipeline: TranscodePipeline,
        config: TranscodeQueueConfig,
        mut jobs_rx: mpsc::UnboundedReceiver<TranscodeJob>,
        mut shutdown_rx: mpsc::Receiver<Duration>,
        in_flight: InFlight,
        job_finished_tx: Option<JobFinishedSender>,
    ) {
        let max_workers = config.max_workers.max(1);
        tracing::info!(max_workers, "Transcode worker pool started");
        let semaphore = Arc::new(Semaphore::new(max_workers));

        let grace = loop {
            tokio::select! {
                grace = shutdown_rx.recv() => {
                    break grace.unwrap_or_default();
                }
                job = jobs_rx.recv() => {
                    let Some(job) = job else {
                        break Duration::ZERO;
                    };
                    // Shutdown must win over a pool that is full
                    let permit = tokio::select! {
                        biased;
                        grace = shutdown_rx.recv() => {
                            lock(&in_flight).remove(&job.asset_id);
                            tracing::debug!(asset_id = %job.asset_id, "Dropping job that never started");
                            break grace.unwrap_or_default();
                        }
                        permit = semaphore.clone().acquire_owned() => match permit {
                            Ok(permit) => permit,
                            Err(_) => break Duration::ZERO,
                        },
                    };
                    let guard = InFlightGuard {
                        in_flight: in_flight.clone(),
                        asset_id: job.asset_id,
                    };
                    let pipeline = pipeline.clone();
                    let finished_tx = job_finished_tx.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        let _guard = guard;
                        let outcome = Self::process_job(&pipeline, &job).await;
                        if let (Some(tx), Some(outcome)) = (finished_tx, outcome) {
                            let _ = tx.send((job.asset_id, outcome));
                        }
                    });
                }
            }
        };

        jobs_rx.close();
        let mut dropped = 0usize;
        while let Ok(job) = jobs_rx.try_recv() {
            lock(&in_flight).remove(&job.asset_id);
            dropped += 1;
        }
        tracing::info!(dropped, "Transcode worker pool shutting down");

        let drained = tokio::time::timeout(grace, semaphore.acquire_many(max_workers as u32)).await;
        if drained.is_err() {
            tracing::warn!(
                grace_secs = grace.as_secs(),
                "Transcode jobs still running after grace period"
            );
        }
        tracing::info!("Transcode worker pool stopped");
    }

    #[tracing::instrument(skip(pipeline, job), fields(asset_id = %job.asset_id))]
    async fn process_job(pipeline: &TranscodePipeline, job: &TranscodeJob) -> Option<JobOutcome> {
        let asset = match pipeline.store().get_asset(job.asset_id).await {
            Ok(Some(asset)) => asset,
            Ok(None) => {
                tracing::warn!("Queued asset does not exist");
                return Some(JobOutcome::Missing);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load queued asset");
                return None;
            }
        };

        if asset.processing_status != ProcessingStatus::Pending {
            tracing::debug!(status = %asset.processing_status, "Asset not pending, not processing");
            return Some(JobOutcome::Skipped(asset.processing_status));
        }
        if asset.storage_key != job.storage_key {
            tracing::warn!(
                expected = %asset.storage_key,
                submitted = %job.storage_key,
                "Storage key does not match asset, not processing"
            );
            return Some(JobOutcome::Skipped(asset.processing_status));
        }

        match pipeline.run(job.asset_id).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::error!(error = %format!("{:#}", e), "Transcode job errored");
                None
            }
        }
    }
}
