use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Kind of uploaded media, derived from its MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "media_kind", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify a MIME type against the configured allow-lists.
    pub fn from_content_type(
        content_type: &str,
        image_types: &[String],
        video_types: &[String],
    ) -> Option<MediaKind> {
        let ct = content_type.trim().to_lowercase();
        if image_types.iter().any(|t| *t == ct) {
            Some(MediaKind::Image)
        } else if video_types.iter().any(|t| *t == ct) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "processing_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    /// Status only moves `pending -> processing -> {completed | failed}`.
    pub fn can_transition_to(self, next: ProcessingStatus) -> bool {
        matches!(
            (self, next),
            (ProcessingStatus::Pending, ProcessingStatus::Processing)
                | (ProcessingStatus::Processing, ProcessingStatus::Completed)
                | (ProcessingStatus::Processing, ProcessingStatus::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }
}

impl Display for ProcessingStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ProcessingStatus::Pending => write!(f, "pending"),
            ProcessingStatus::Processing => write!(f, "processing"),
            ProcessingStatus::Completed => write!(f, "completed"),
            ProcessingStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Derived rendition kinds.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, ToSchema,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "variant_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum VariantType {
    Thumbnail,
    Preview,
    Full,
    VideoThumbnail,
    HlsRendition,
    HlsManifest,
}

impl VariantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantType::Thumbnail => "thumbnail",
            VariantType::Preview => "preview",
            VariantType::Full => "full",
            VariantType::VideoThumbnail => "video_thumbnail",
            VariantType::HlsRendition => "hls_rendition",
            VariantType::HlsManifest => "hls_manifest",
        }
    }

    /// Video renditions get short-lived read URLs.
    pub fn is_video_stream(&self) -> bool {
        matches!(self, VariantType::HlsRendition)
    }
}

impl Display for VariantType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariantType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "thumbnail" => Ok(VariantType::Thumbnail),
            "preview" => Ok(VariantType::Preview),
            "full" => Ok(VariantType::Full),
            "video_thumbnail" => Ok(VariantType::VideoThumbnail),
            "hls_rendition" => Ok(VariantType::HlsRendition),
            "hls_manifest" => Ok(VariantType::HlsManifest),
            _ => Err(anyhow::anyhow!("Unknown rendition: {}", s)),
        }
    }
}

/// An uploaded media file and the URLs of its finished renditions.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MediaAsset {
    pub id: Uuid,
    pub original_filename: String,
    pub file_size: i64,
    pub content_type: String,
    pub kind: MediaKind,
    /// Key of the raw upload in object storage
    pub storage_key: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    /// Seconds; video only
    pub duration: Option<f64>,
    pub processing_status: ProcessingStatus,
    pub error_message: Option<String>,
    pub thumbnail_url: Option<String>,
    pub preview_url: Option<String>,
    pub full_url: Option<String>,
    pub video_thumbnail_url: Option<String>,
    pub hls_manifest_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaAsset {
    /// A freshly uploaded asset waiting for the transcode worker.
    pub fn new_pending(
        id: Uuid,
        original_filename: impl Into<String>,
        file_size: i64,
        content_type: impl Into<String>,
        kind: MediaKind,
        storage_key: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            original_filename: original_filename.into(),
            file_size,
            content_type: content_type.into(),
            kind,
            storage_key: storage_key.into(),
            width: None,
            height: None,
            duration: None,
            processing_status: ProcessingStatus::Pending,
            error_message: None,
            thumbnail_url: None,
            preview_url: None,
            full_url: None,
            video_thumbnail_url: None,
            hls_manifest_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn rendition_url(&self, variant_type: VariantType) -> Option<&str> {
        match variant_type {
            VariantType::Thumbnail => self.thumbnail_url.as_deref(),
            VariantType::Preview => self.preview_url.as_deref(),
            VariantType::Full => self.full_url.as_deref(),
            VariantType::VideoThumbnail => self.video_thumbnail_url.as_deref(),
            VariantType::HlsManifest => self.hls_manifest_url.as_deref(),
            VariantType::HlsRendition => None,
        }
    }

    pub fn set_rendition_url(&mut self, variant_type: VariantType, url: String) {
        match variant_type {
            VariantType::Thumbnail => self.thumbnail_url = Some(url),
            VariantType::Preview => self.preview_url = Some(url),
            VariantType::Full => self.full_url = Some(url),
            VariantType::VideoThumbnail => self.video_thumbnail_url = Some(url),
            VariantType::HlsManifest => self.hls_manifest_url = Some(url),
            VariantType::HlsRendition => {}
        }
    }
}

/// One stored rendition of an asset.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MediaVariant {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub variant_type: VariantType,
    /// Position in the bitrate ladder for HLS renditions
    pub segment_index: Option<i32>,
    pub storage_key: String,
    pub url: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub file_size: i64,
    pub format: String,
    pub bitrate_kbps: Option<i32>,
    pub superseded: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields the pipeline supplies when recording a finished upload.
#[derive(Debug, Clone)]
pub struct NewMediaVariant {
    pub asset_id: Uuid,
    pub variant_type: VariantType,
    pub segment_index: Option<i32>,
    pub storage_key: String,
    pub url: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub file_size: i64,
    pub format: String,
    pub bitrate_kbps: Option<i32>,
}

impl NewMediaVariant {
    pub fn into_variant(self) -> MediaVariant {
        MediaVariant {
            id: Uuid::new_v4(),
            asset_id: self.asset_id,
            variant_type: self.variant_type,
            segment_index: self.segment_index,
            storage_key: self.storage_key,
            url: self.url,
            width: self.width,
            height: self.height,
            file_size: self.file_size,
            format: self.format,
            bitrate_kbps: self.bitrate_kbps,
            superseded: false,
            created_at: Utc::now(),
        }
    }
}

/// Probe results recorded on the asset before renditions are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MediaDimensions {
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub duration: Option<f64>,
}
