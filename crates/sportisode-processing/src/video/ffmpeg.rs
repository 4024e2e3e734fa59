use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sportisode_core::{MediaConfig, RenditionSpec};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::toolkit::{VideoProbe, VideoToolkit};

/// Reject paths carrying shell metacharacters or traversal.
fn validate_path(path: &str) -> Result<()> {
    let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
    if path.chars().any(|c| dangerous_chars.contains(&c)) {
        return Err(anyhow!("Path contains dangerous characters: {}", path));
    }
    if path.contains("..") {
        return Err(anyhow!("Path contains directory traversal: {}", path));
    }
    Ok(())
}

/// `ffprobe`/`ffmpeg` subprocesses, each bounded by a timeout and killed on expiry
#[derive(Debug, Clone)]
pub struct FfmpegToolkit {
    ffmpeg_path: String,
    ffprobe_path: String,
    probe_timeout: Duration,
    ffmpeg_timeout: Duration,
}

impl FfmpegToolkit {
    pub fn new(
        ffmpeg_path: String,
        ffprobe_path: String,
        probe_timeout: Duration,
        ffmpeg_timeout: Duration,
    ) -> Result<Self> {
        validate_path(&ffmpeg_path).context("Invalid ffmpeg_path")?;
        validate_path(&ffprobe_path).context("Invalid ffprobe_path")?;
        Ok(Self {
            ffmpeg_path,
            ffprobe_path,
            probe_timeout,
            ffmpeg_timeout,
        })
    }

    pub fn from_config(media: &MediaConfig) -> Result<Self> {
        Self::new(
            media.ffmpeg_path.clone(),
            media.ffprobe_path.clone(),
            Duration::from_secs(media.ffprobe_timeout_secs),
            Duration::from_secs(media.ffmpeg_timeout_secs),
        )
    }

    pub fn probe_args(input: &Path) -> Vec<String> {
        vec![
            "-v".to_string(),
            "quiet".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            "-show_format".to_string(),
            "-show_streams".to_string(),
            "-select_streams".to_string(),
            "v:0".to_string(),
            input.to_string_lossy().to_string(),
        ]
    }

    pub fn frame_args(input: &Path, at_secs: f64, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-ss".to_string(),
            format!("{:.3}", at_secs.max(0.0)),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
            "-f".to_string(),
            "image2".to_string(),
            "-c:v".to_string(),
            "png".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }

    pub fn transcode_args(input: &Path, rendition: &RenditionSpec, output: &Path) -> Vec<String> {
        let bitrate = rendition.bitrate_kbps;
        vec![
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "fast".to_string(),
            "-profile:v".to_string(),
            "main".to_string(),
            "-vf".to_string(),
            format!("scale={}:{}", rendition.width, rendition.height),
            "-b:v".to_string(),
            format!("{}k", bitrate),
            "-maxrate".to_string(),
            format!("{}k", bitrate + bitrate / 5),
            "-bufsize".to_string(),
            format!("{}k", bitrate * 2),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            "128k".to_string(),
            "-ac".to_string(),
            "2".to_string(),
            "-ar".to_string(),
            "48000".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            "-f".to_string(),
            "mp4".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }

    async fn run(&self, program: &str, args: &[String], limit: Duration) -> Result<Vec<u8>> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(limit, child)
            .await
            .map_err(|_| anyhow!("{} timed out after {}s", program, limit.as_secs()))?
            .with_context(|| format!("Failed to execute {}", program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(5)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            return Err(anyhow!("{} failed: {}", program, tail));
        }
        Ok(output.stdout)
    }
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_probe_output(stdout: &[u8]) -> Result<VideoProbe> {
    let probe: serde_json::Value =
        serde_json::from_slice(stdout).context("Failed to parse ffprobe output")?;

    let stream = probe["streams"]
        .get(0)
        .ok_or_else(|| anyhow!("No video stream found"))?;

    let parse_secs = |v: &serde_json::Value| v.as_str().and_then(|d| d.parse::<f64>().ok());
    let duration = parse_secs(&probe["format"]["duration"])
        .or_else(|| parse_secs(&stream["duration"]))
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| anyhow!("Could not parse duration"))?;

    let width = stream["width"]
        .as_u64()
        .ok_or_else(|| anyhow!("Could not parse width"))? as u32;
    let height = stream["height"]
        .as_u64()
        .ok_or_else(|| anyhow!("Could not parse height"))? as u32;
    let codec = stream["codec_name"]
        .as_str()
        .unwrap_or("unknown")
        .to_string();

    Ok(VideoProbe {
        duration,
        width,
        height,
        codec,
    })
}

#[async_trait]
impl VideoToolkit for FfmpegToolkit {
    #[tracing::instrument(skip(self), fields(process.executable.name = "ffprobe"))]
    async fn probe(&self, input: &Path) -> Result<VideoProbe> {
        let stdout = self
            .run(&self.ffprobe_path, &Self::probe_args(input), self.probe_timeout)
            .await?;
        let probe = parse_probe_output(&stdout)?;
        tracing::info!(
            video_duration = probe.duration,
            width = probe.width,
            height = probe.height,
            codec = %probe.codec,
            "Video probe completed"
        );
        Ok(probe)
    }

    async fn extract_frame(&self, input: &Path, at_secs: f64, output: &Path) -> Result<()> {
        self.run(
            &self.ffmpeg_path,
            &Self::frame_args(input, at_secs, output),
            self.ffmpeg_timeout,
        )
        .await
        .context("Frame extraction failed")?;
        Ok(())
    }

    #[tracing::instrument(skip(self, input, output), fields(bitrate_kbps = rendition.bitrate_kbps))]
    async fn transcode(
        &self,
        input: &Path,
        rendition: &RenditionSpec,
        output: &Path,
    ) -> Result<()> {
        let start = std::time::Instant::now();
        self.run(
            &self.ffmpeg_path,
            &Self::transcode_args(input, rendition, output),
            self.ffmpeg_timeout,
        )
        .await
        .with_context(|| format!("Transcode to {} failed", rendition))?;
        tracing::info!(
            duration_ms = start.elapsed().as_millis() as u64,
            resolution = %format!("{}x{}", rendition.width, rendition.height),
            "Rendition transcoded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn rejects_dangerous_binary_paths() {
        let limit = Duration::from_secs(1);
        assert!(FfmpegToolkit::new("ffmpeg; rm -rf /".into(), "ffprobe".into(), limit, limit).is_err());
        assert!(FfmpegToolkit::new("ffmpeg".into(), "../ffprobe".into(), limit, limit).is_err());
        assert!(FfmpegToolkit::new("/usr/bin/ffmpeg".into(), "ffprobe".into(), limit, limit).is_ok());
    }

    #[test]
    fn parses_probe_json() {
        let stdout = br#"{
            "streams": [{"codec_name": "h264", "width": 1920, "height": 1080, "duration": "12.0"}],
            "format": {"duration": "12.480000", "bit_rate": "5000000"}
        }"#;
        let probe = parse_probe_output(stdout).unwrap();
        assert_eq!(probe.width, 1920);
        assert_eq!(probe.height, 1080);
        assert!((probe.duration - 12.48).abs() < 1e-9);
        assert_eq!(probe.codec, "h264");
    }

    #[test]
    fn probe_duration_falls_back_to_stream() {
        let stdout = br#"{"streams": [{"width": 640, "height": 360, "duration": "3.5"}], "format": {}}"#;
        let probe = parse_probe_output(stdout).unwrap();
        assert_eq!(probe.duration, 3.5);
        assert_eq!(probe.codec, "unknown");
    }

    #[test]
    fn probe_without_video_stream_fails() {
        assert!(parse_probe_output(br#"{"streams": [], "format": {"duration": "1"}}"#).is_err());
        assert!(parse_probe_output(b"not json").is_err());
    }

    #[test]
    fn transcode_args_encode_ladder_entry() {
        let args = FfmpegToolkit::transcode_args(
            &PathBuf::from("/tmp/in"),
            &RenditionSpec::new(1400, 854, 480),
            &PathBuf::from("/tmp/out.mp4"),
        );
        let joined = args.join(" ");
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-c:a aac"));
        assert!(joined.contains("-vf scale=854:480"));
        assert!(joined.contains("-b:v 1400k"));
        assert!(joined.contains("-maxrate 1680k"));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/out.mp4"));
    }

    #[test]
    fn frame_args_seek_before_input() {
        let args = FfmpegToolkit::frame_args(
            &PathBuf::from("/tmp/in"),
            0.75,
            &PathBuf::from("/tmp/frame.png"),
        );
        let seek = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(seek < input);
        assert_eq!(args[seek + 1], "0.750");
    }
}
