//! Video probing, frame extraction, transcoding and HLS manifests

mod ffmpeg;
mod manifest;
mod toolkit;

pub use ffmpeg::{parse_probe_output, FfmpegToolkit};
pub use manifest::{master_manifest, ManifestEntry, HLS_CONTENT_TYPE};
pub use toolkit::{VideoProbe, VideoToolkit};
