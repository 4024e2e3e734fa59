//! Configuration module
//!
//! Settings are read from the environment (and an optional `.env` file) once at
//! startup. Every value has a default so a development instance boots with no
//! configuration at all; `validate` enforces what production needs.

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::storage_types::StorageBackend;

// Server
const DEFAULT_PORT: u16 = 4000;
const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;
const DB_MAX_CONNECTIONS: u32 = 10;

// Media processing
const THUMBNAIL_SIZE: (u32, u32) = (150, 150);
const PREVIEW_SIZE: (u32, u32) = (800, 600);
const VIDEO_THUMBNAIL_SIZE: (u32, u32) = (320, 180);
const VIDEO_THUMBNAIL_TIME_SECS: f64 = 1.0;
const DEFAULT_HLS_LADDER: &str = "800k:640x360,1400k:854x480,2800k:1280x720";
const JPEG_QUALITY: u8 = 85;
const MAX_IMAGE_SIZE_MB: usize = 20;
const MAX_VIDEO_SIZE_MB: usize = 500;
const DOWNLOAD_TIMEOUT_SECS: u64 = 120;
const UPLOAD_TIMEOUT_SECS: u64 = 120;
const FFPROBE_TIMEOUT_SECS: u64 = 30;
const FFMPEG_TIMEOUT_SECS: u64 = 900;
const MAX_CONCURRENT_TRANSCODES: usize = 2;

// Integrations
const THESPORTSDB_BASE_URL: &str = "https://www.thesportsdb.com/api/v1/json";
const THESPORTSDB_FREE_KEY: &str = "3";
const THESPORTSDB_HOURLY_LIMIT: u32 = 100;
const THESPORTSDB_TIMEOUT_SECS: u64 = 10;
const API_FOOTBALL_BASE_URL: &str = "https://api-football-v1.p.rapidapi.com/v3";
const API_FOOTBALL_HOST: &str = "api-football-v1.p.rapidapi.com";
const API_FOOTBALL_HOURLY_LIMIT: u32 = 300;
const API_FOOTBALL_TIMEOUT_SECS: u64 = 15;
const INTEGRATION_BURST_LIMIT: u32 = 10;

// Broadcast provider
const BROADCAST_API_URL: &str = "https://api.mux.com";
const BROADCAST_INGEST_URL: &str = "rtmp://global-live.mux.com:5222/app";
const BROADCAST_PLAYBACK_BASE_URL: &str = "https://stream.mux.com";
const BROADCAST_TIMEOUT_SECS: u64 = 15;
const WEBHOOK_TOLERANCE_SECS: u64 = 300;

/// One rung of the HLS bitrate ladder: target video bitrate and frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenditionSpec {
    pub bitrate_kbps: u32,
    pub width: u32,
    pub height: u32,
}

impl RenditionSpec {
    pub const fn new(bitrate_kbps: u32, width: u32, height: u32) -> Self {
        Self {
            bitrate_kbps,
            width,
            height,
        }
    }

    /// Parse a comma separated ladder such as `800k:640x360,1400k:854x480`.
    pub fn parse_ladder(s: &str) -> Result<Vec<RenditionSpec>, anyhow::Error> {
        let ladder = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<_>, _>>()?;
        if ladder.is_empty() {
            return Err(anyhow::anyhow!("HLS ladder must contain at least one rendition"));
        }
        Ok(ladder)
    }
}

impl FromStr for RenditionSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (bitrate, size) = s
            .split_once(':')
            .ok_or_else(|| anyhow::anyhow!("Invalid rendition '{}', expected <kbps>k:<w>x<h>", s))?;
        let bitrate_kbps = bitrate
            .trim()
            .trim_end_matches(['k', 'K'])
            .parse::<u32>()
            .map_err(|_| anyhow::anyhow!("Invalid bitrate in rendition '{}'", s))?;
        let (w, h) = size
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| anyhow::anyhow!("Invalid resolution in rendition '{}'", s))?;
        let width = w
            .parse::<u32>()
            .map_err(|_| anyhow::anyhow!("Invalid width in rendition '{}'", s))?;
        let height = h
            .parse::<u32>()
            .map_err(|_| anyhow::anyhow!("Invalid height in rendition '{}'", s))?;
        if bitrate_kbps == 0 || width == 0 || height == 0 {
            return Err(anyhow::anyhow!("Rendition '{}' has a zero component", s));
        }
        Ok(RenditionSpec::new(bitrate_kbps, width, height))
    }
}

impl Display for RenditionSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}k:{}x{}", self.bitrate_kbps, self.width, self.height)
    }
}

/// Base configuration shared by every binary
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    pub max_body_bytes: usize,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub local_storage_path: String,
    pub local_storage_base_url: String,
    /// Secret for the local backend's self-signed URLs
    pub url_signing_secret: String,
}

#[derive(Clone, Debug)]
pub struct MediaConfig {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub thumbnail_size: (u32, u32),
    pub preview_size: (u32, u32),
    pub video_thumbnail_size: (u32, u32),
    pub video_thumbnail_time_secs: f64,
    pub hls_ladder: Vec<RenditionSpec>,
    /// "webp" (lossless) or "jpeg"
    pub image_output_format: String,
    pub jpeg_quality: u8,
    pub max_image_size_bytes: usize,
    pub max_video_size_bytes: usize,
    pub allowed_image_content_types: Vec<String>,
    pub allowed_video_content_types: Vec<String>,
    pub download_timeout_secs: u64,
    pub upload_timeout_secs: u64,
    pub ffprobe_timeout_secs: u64,
    pub ffmpeg_timeout_secs: u64,
    pub max_concurrent_transcodes: usize,
}

#[derive(Clone, Debug)]
pub struct IntegrationsConfig {
    pub thesportsdb_base_url: String,
    pub thesportsdb_api_key: String,
    pub thesportsdb_hourly_limit: u32,
    pub thesportsdb_timeout_secs: u64,
    pub api_football_base_url: String,
    pub api_football_host: String,
    pub api_football_key: Option<String>,
    pub api_football_hourly_limit: u32,
    pub api_football_timeout_secs: u64,
    pub burst_limit: u32,
}

#[derive(Clone, Debug)]
pub struct BroadcastConfig {
    pub api_url: String,
    pub token_id: Option<String>,
    pub token_secret: Option<String>,
    pub ingest_url: String,
    pub playback_base_url: String,
    pub timeout_secs: u64,
    pub webhook_secret: Option<String>,
    pub webhook_tolerance_secs: u64,
}

/// Full application configuration
#[derive(Clone, Debug)]
pub struct SportisodeConfig {
    pub base: BaseConfig,
    pub storage: StorageConfig,
    pub media: MediaConfig,
    pub integrations: IntegrationsConfig,
    pub broadcast: BroadcastConfig,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<SportisodeConfig>);

impl Config {
    fn inner(&self) -> &SportisodeConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.inner().base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = SportisodeConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate(self.is_production())
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn max_body_bytes(&self) -> usize {
        self.inner().base.max_body_bytes
    }

    pub fn database_url(&self) -> Option<&str> {
        self.inner().base.database_url.as_deref()
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().base.db_max_connections
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.inner().storage
    }

    pub fn media(&self) -> &MediaConfig {
        &self.inner().media
    }

    pub fn integrations(&self) -> &IntegrationsConfig {
        &self.inner().integrations
    }

    pub fn broadcast(&self) -> &BroadcastConfig {
        &self.inner().broadcast
    }

    pub fn max_concurrent_transcodes(&self) -> usize {
        self.inner().media.max_concurrent_transcodes
    }
}

impl Default for Config {
    fn default() -> Self {
        Config(Box::new(SportisodeConfig::default()))
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_list(key: &str, default: &str) -> Vec<String> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_size(key: &str, default: (u32, u32)) -> Result<(u32, u32), anyhow::Error> {
    match env::var(key) {
        Ok(raw) => {
            let (w, h) = raw
                .trim()
                .split_once(['x', 'X'])
                .ok_or_else(|| anyhow::anyhow!("{} must look like WIDTHxHEIGHT", key))?;
            let w = w
                .parse()
                .map_err(|_| anyhow::anyhow!("{} has an invalid width", key))?;
            let h = h
                .parse()
                .map_err(|_| anyhow::anyhow!("{} has an invalid height", key))?;
            Ok((w, h))
        }
        Err(_) => Ok(default),
    }
}

impl Default for SportisodeConfig {
    fn default() -> Self {
        Self {
            base: BaseConfig {
                server_port: DEFAULT_PORT,
                cors_origins: vec!["*".to_string()],
                environment: "development".to_string(),
                max_body_bytes: DEFAULT_MAX_BODY_BYTES,
                database_url: None,
                db_max_connections: DB_MAX_CONNECTIONS,
            },
            storage: StorageConfig {
                backend: StorageBackend::Local,
                s3_bucket: None,
                s3_region: None,
                s3_endpoint: None,
                aws_access_key_id: None,
                aws_secret_access_key: None,
                local_storage_path: "./storage".to_string(),
                local_storage_base_url: format!("http://localhost:{}/files", DEFAULT_PORT),
                url_signing_secret: "development-url-signing-secret".to_string(),
            },
            media: MediaConfig {
                ffmpeg_path: "ffmpeg".to_string(),
                ffprobe_path: "ffprobe".to_string(),
                thumbnail_size: THUMBNAIL_SIZE,
                preview_size: PREVIEW_SIZE,
                video_thumbnail_size: VIDEO_THUMBNAIL_SIZE,
                video_thumbnail_time_secs: VIDEO_THUMBNAIL_TIME_SECS,
                hls_ladder: vec![
                    RenditionSpec::new(800, 640, 360),
                    RenditionSpec::new(1400, 854, 480),
                    RenditionSpec::new(2800, 1280, 720),
                ],
                image_output_format: "webp".to_string(),
                jpeg_quality: JPEG_QUALITY,
                max_image_size_bytes: MAX_IMAGE_SIZE_MB * 1024 * 1024,
                max_video_size_bytes: MAX_VIDEO_SIZE_MB * 1024 * 1024,
                allowed_image_content_types: vec![
                    "image/jpeg".to_string(),
                    "image/png".to_string(),
                    "image/gif".to_string(),
                    "image/webp".to_string(),
                ],
                allowed_video_content_types: vec![
                    "video/mp4".to_string(),
                    "video/quicktime".to_string(),
                    "video/webm".to_string(),
                    "video/x-matroska".to_string(),
                ],
                download_timeout_secs: DOWNLOAD_TIMEOUT_SECS,
                upload_timeout_secs: UPLOAD_TIMEOUT_SECS,
                ffprobe_timeout_secs: FFPROBE_TIMEOUT_SECS,
                ffmpeg_timeout_secs: FFMPEG_TIMEOUT_SECS,
                max_concurrent_transcodes: MAX_CONCURRENT_TRANSCODES,
            },
            integrations: IntegrationsConfig {
                thesportsdb_base_url: THESPORTSDB_BASE_URL.to_string(),
                thesportsdb_api_key: THESPORTSDB_FREE_KEY.to_string(),
                thesportsdb_hourly_limit: THESPORTSDB_HOURLY_LIMIT,
                thesportsdb_timeout_secs: THESPORTSDB_TIMEOUT_SECS,
                api_football_base_url: API_FOOTBALL_BASE_URL.to_string(),
                api_football_host: API_FOOTBALL_HOST.to_string(),
                api_football_key: None,
                api_football_hourly_limit: API_FOOTBALL_HOURLY_LIMIT,
                api_football_timeout_secs: API_FOOTBALL_TIMEOUT_SECS,
                burst_limit: INTEGRATION_BURST_LIMIT,
            },
            broadcast: BroadcastConfig {
                api_url: BROADCAST_API_URL.to_string(),
                token_id: None,
                token_secret: None,
                ingest_url: BROADCAST_INGEST_URL.to_string(),
                playback_base_url: BROADCAST_PLAYBACK_BASE_URL.to_string(),
                timeout_secs: BROADCAST_TIMEOUT_SECS,
                webhook_secret: None,
                webhook_tolerance_secs: WEBHOOK_TOLERANCE_SECS,
            },
        }
    }
}

impl SportisodeConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let defaults = SportisodeConfig::default();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }
        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let server_port = env::var("PORT")
            .unwrap_or_else(|_| DEFAULT_PORT.to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?;

        let base = BaseConfig {
            server_port,
            cors_origins,
            environment,
            max_body_bytes: env_or("MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES),
            database_url: env_opt("DATABASE_URL"),
            db_max_connections: env_or("DB_MAX_CONNECTIONS", DB_MAX_CONNECTIONS),
        };

        let backend = match env_opt("STORAGE_BACKEND") {
            Some(raw) => raw.parse::<StorageBackend>()?,
            None => defaults.storage.backend,
        };
        let local_storage_base_url = env::var("LOCAL_STORAGE_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}/files", server_port));
        let storage = StorageConfig {
            backend,
            s3_bucket: env_opt("S3_BUCKET"),
            s3_region: env_opt("S3_REGION").or_else(|| env_opt("AWS_REGION")),
            s3_endpoint: env_opt("S3_ENDPOINT"),
            aws_access_key_id: env_opt("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: env_opt("AWS_SECRET_ACCESS_KEY"),
            local_storage_path: env::var("LOCAL_STORAGE_PATH")
                .unwrap_or(defaults.storage.local_storage_path),
            local_storage_base_url,
            url_signing_secret: env::var("URL_SIGNING_SECRET")
                .unwrap_or(defaults.storage.url_signing_secret),
        };

        let hls_ladder = match env_opt("HLS_LADDER") {
            Some(raw) => RenditionSpec::parse_ladder(&raw)?,
            None => RenditionSpec::parse_ladder(DEFAULT_HLS_LADDER)?,
        };

        let image_output_format = env::var("IMAGE_OUTPUT_FORMAT")
            .unwrap_or_else(|_| "webp".to_string())
            .to_lowercase();

        let media = MediaConfig {
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".to_string()),
            thumbnail_size: env_size("THUMBNAIL_SIZE", THUMBNAIL_SIZE)?,
            preview_size: env_size("PREVIEW_SIZE", PREVIEW_SIZE)?,
            video_thumbnail_size: env_size("VIDEO_THUMBNAIL_SIZE", VIDEO_THUMBNAIL_SIZE)?,
            video_thumbnail_time_secs: env_or("VIDEO_THUMBNAIL_TIME_SECS", VIDEO_THUMBNAIL_TIME_SECS),
            hls_ladder,
            image_output_format,
            jpeg_quality: env_or("JPEG_QUALITY", JPEG_QUALITY),
            max_image_size_bytes: env_or("MAX_IMAGE_SIZE_MB", MAX_IMAGE_SIZE_MB) * 1024 * 1024,
            max_video_size_bytes: env_or("MAX_VIDEO_SIZE_MB", MAX_VIDEO_SIZE_MB) * 1024 * 1024,
            allowed_image_content_types: env_list(
                "ALLOWED_IMAGE_CONTENT_TYPES",
                "image/jpeg,image/png,image/gif,image/webp",
            ),
            allowed_video_content_types: env_list(
                "ALLOWED_VIDEO_CONTENT_TYPES",
                "video/mp4,video/quicktime,video/webm,video/x-matroska",
            ),
            download_timeout_secs: env_or("DOWNLOAD_TIMEOUT_SECS", DOWNLOAD_TIMEOUT_SECS),
            upload_timeout_secs: env_or("UPLOAD_TIMEOUT_SECS", UPLOAD_TIMEOUT_SECS),
            ffprobe_timeout_secs: env_or("FFPROBE_TIMEOUT_SECS", FFPROBE_TIMEOUT_SECS),
            ffmpeg_timeout_secs: env_or("FFMPEG_TIMEOUT_SECS", FFMPEG_TIMEOUT_SECS),
            max_concurrent_transcodes: env_or(
                "MAX_CONCURRENT_TRANSCODES",
                MAX_CONCURRENT_TRANSCODES,
            ),
        };

        let integrations = IntegrationsConfig {
            thesportsdb_base_url: env::var("THESPORTSDB_BASE_URL")
                .unwrap_or_else(|_| THESPORTSDB_BASE_URL.to_string()),
            thesportsdb_api_key: env::var("THESPORTSDB_API_KEY")
                .unwrap_or_else(|_| THESPORTSDB_FREE_KEY.to_string()),
            thesportsdb_hourly_limit: env_or("THESPORTSDB_HOURLY_LIMIT", THESPORTSDB_HOURLY_LIMIT),
            thesportsdb_timeout_secs: env_or("THESPORTSDB_TIMEOUT_SECS", THESPORTSDB_TIMEOUT_SECS),
            api_football_base_url: env::var("API_FOOTBALL_BASE_URL")
                .unwrap_or_else(|_| API_FOOTBALL_BASE_URL.to_string()),
            api_football_host: env::var("API_FOOTBALL_HOST")
                .unwrap_or_else(|_| API_FOOTBALL_HOST.to_string()),
            api_football_key: env_opt("API_FOOTBALL_KEY"),
            api_football_hourly_limit: env_or("API_FOOTBALL_HOURLY_LIMIT", API_FOOTBALL_HOURLY_LIMIT),
            api_football_timeout_secs: env_or("API_FOOTBALL_TIMEOUT_SECS", API_FOOTBALL_TIMEOUT_SECS),
            burst_limit: env_or("INTEGRATION_BURST_LIMIT", INTEGRATION_BURST_LIMIT),
        };

        let broadcast = BroadcastConfig {
            api_url: env::var("BROADCAST_API_URL").unwrap_or_else(|_| BROADCAST_API_URL.to_string()),
            token_id: env_opt("BROADCAST_TOKEN_ID"),
            token_secret: env_opt("BROADCAST_TOKEN_SECRET"),
            ingest_url: env::var("BROADCAST_INGEST_URL")
                .unwrap_or_else(|_| BROADCAST_INGEST_URL.to_string()),
            playback_base_url: env::var("BROADCAST_PLAYBACK_BASE_URL")
                .unwrap_or_else(|_| BROADCAST_PLAYBACK_BASE_URL.to_string()),
            timeout_secs: env_or("BROADCAST_TIMEOUT_SECS", BROADCAST_TIMEOUT_SECS),
            webhook_secret: env_opt("BROADCAST_WEBHOOK_SECRET"),
            webhook_tolerance_secs: env_or("WEBHOOK_TOLERANCE_SECS", WEBHOOK_TOLERANCE_SECS),
        };

        Ok(Self {
            base,
            storage,
            media,
            integrations,
            broadcast,
        })
    }

    pub fn validate(&self, is_production: bool) -> Result<(), anyhow::Error> {
        if let Some(url) = &self.base.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        }

        match self.storage.backend {
            StorageBackend::S3 => {
                if self.storage.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.storage.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if is_production && self.storage.url_signing_secret.len() < 32 {
                    return Err(anyhow::anyhow!(
                        "URL_SIGNING_SECRET must be at least 32 characters in production"
                    ));
                }
            }
        }

        if !matches!(self.media.image_output_format.as_str(), "webp" | "jpeg") {
            return Err(anyhow::anyhow!(
                "IMAGE_OUTPUT_FORMAT must be 'webp' or 'jpeg'"
            ));
        }
        if self.media.jpeg_quality == 0 || self.media.jpeg_quality > 100 {
            return Err(anyhow::anyhow!("JPEG_QUALITY must be between 1 and 100"));
        }
        if self.media.max_concurrent_transcodes == 0 {
            return Err(anyhow::anyhow!(
                "MAX_CONCURRENT_TRANSCODES must be at least 1"
            ));
        }
        if self.media.hls_ladder.is_empty() {
            return Err(anyhow::anyhow!("HLS_LADDER must not be empty"));
        }

        if self.integrations.burst_limit == 0 {
            return Err(anyhow::anyhow!("INTEGRATION_BURST_LIMIT must be at least 1"));
        }

        if is_production
            && (self.broadcast.token_id.is_none() || self.broadcast.token_secret.is_none())
        {
            return Err(anyhow::anyhow!(
                "BROADCAST_TOKEN_ID and BROADCAST_TOKEN_SECRET must be set in production"
            ));
        }

        Ok(())
    }
}
