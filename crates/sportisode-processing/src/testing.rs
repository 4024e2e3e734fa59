//! Test doubles for code that drives the transcode pipeline

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use sportisode_core::RenditionSpec;
use std::io::Cursor;
use std::path::Path;
use std::sync::Mutex;

use crate::video::{VideoProbe, VideoToolkit};

/// PNG of the given size with a simple gradient
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut buf = Vec::new();
    // Encoding an in-memory RGB buffer as PNG cannot fail
    let _ = DynamicImage::ImageRgb8(img).write_to(&mut Cursor::new(&mut buf), ImageFormat::Png);
    buf
}

/// Video toolkit that writes placeholder files instead of running ffmpeg
#[derive(Debug)]
pub struct FakeVideoToolkit {
    probe: VideoProbe,
    fail_transcode_at: Option<u32>,
    frame_requests: Mutex<Vec<f64>>,
    transcodes: Mutex<Vec<RenditionSpec>>,
}

impl FakeVideoToolkit {
    pub fn new(duration: f64, width: u32, height: u32) -> Self {
        Self {
            probe: VideoProbe {
                duration,
                width,
                height,
                codec: "h264".to_string(),
            },
            fail_transcode_at: None,
            frame_requests: Mutex::new(Vec::new()),
            transcodes: Mutex::new(Vec::new()),
        }
    }

    /// Fail the transcode whose bitrate matches `bitrate_kbps`
    pub fn failing_transcode(mut self, bitrate_kbps: u32) -> Self {
        self.fail_transcode_at = Some(bitrate_kbps);
        self
    }

    pub fn frame_requests(&self) -> Vec<f64> {
        self.frame_requests
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    pub fn transcodes(&self) -> Vec<RenditionSpec> {
        self.transcodes.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl VideoToolkit for FakeVideoToolkit {
    async fn probe(&self, input: &Path) -> Result<VideoProbe> {
        if !input.exists() {
            return Err(anyhow!("input {} missing", input.display()));
        }
        Ok(self.probe.clone())
    }

    async fn extract_frame(&self, _input: &Path, at_secs: f64, output: &Path) -> Result<()> {
        if let Ok(mut requests) = self.frame_requests.lock() {
            requests.push(at_secs);
        }
        tokio::fs::write(output, png_bytes(self.probe.width, self.probe.height)).await?;
        Ok(())
    }

    async fn transcode(
        &self,
        _input: &Path,
        rendition: &RenditionSpec,
        output: &Path,
    ) -> Result<()> {
        if let Ok(mut transcodes) = self.transcodes.lock() {
            transcodes.push(*rendition);
        }
        if self.fail_transcode_at == Some(rendition.bitrate_kbps) {
            return Err(anyhow!("encoder crashed at {}", rendition));
        }
        tokio::fs::write(output, format!("mp4:{}", rendition)).await?;
        Ok(())
    }
}
