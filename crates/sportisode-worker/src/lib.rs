//! Sportisode Worker – transcode job queue.
//!
//! [`TranscodeQueue::enqueue`] hands an asset to a bounded pool of workers that
//! run the [`sportisode_processing::TranscodePipeline`]. Enqueueing never blocks
//! and never fails the caller.

mod queue;

pub use queue::{EnqueueOutcome, JobFinishedSender, TranscodeQueue, TranscodeQueueConfig};
