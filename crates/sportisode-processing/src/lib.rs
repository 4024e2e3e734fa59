//! Sportisode media processing
//!
//! Turns a raw upload into its renditions: thumbnail, preview and full images for
//! pictures; a poster frame, an H.264 rendition ladder and an HLS master manifest
//! for videos. [`TranscodePipeline`] drives one asset through the
//! `pending -> processing -> completed|failed` state machine.

pub mod image;
pub mod pipeline;
pub mod video;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use self::image::{ImageOutputFormat, MediaDecodeError, RenderedImage};
pub use pipeline::{JobOutcome, PipelineConfig, TranscodePipeline};
pub use video::{master_manifest, FfmpegToolkit, ManifestEntry, VideoProbe, VideoToolkit};
