use anyhow::Result;
use async_trait::async_trait;
use sportisode_core::RenditionSpec;
use std::path::Path;

/// Stream metadata from the source container
#[derive(Debug, Clone, PartialEq)]
pub struct VideoProbe {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub codec: String,
}

/// External video tooling used by the transcode pipeline
#[async_trait]
pub trait VideoToolkit: Send + Sync {
    async fn probe(&self, input: &Path) -> Result<VideoProbe>;

    /// Write one still frame taken `at_secs` into the video to `output` (PNG).
    async fn extract_frame(&self, input: &Path, at_secs: f64, output: &Path) -> Result<()>;

    /// Write an H.264/AAC MP4 at the rendition's size and bitrate to `output`.
    async fn transcode(&self, input: &Path, rendition: &RenditionSpec, output: &Path)
        -> Result<()>;
}
