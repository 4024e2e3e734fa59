use crate::error::{ErrorResponse, HttpAppError};
use crate::state::MediaState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use sportisode_core::constants::{IMAGE_URL_TTL_SECS, MANIFEST_URL_TTL_SECS, VIDEO_URL_TTL_SECS};
use sportisode_core::models::{
    MediaAsset, MediaKind, ProcessingStatus, SignedUrlResponse, VariantType,
};
use sportisode_core::AppError;
use std::time::Duration;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Deserialize, IntoParams)]
pub struct RenditionQuery {
    /// thumbnail, preview, full, video_thumbnail, hls_rendition or hls_manifest.
    /// Defaults to `full` for images and `hls_manifest` for videos.
    pub rendition: Option<String>,
    /// Ladder position for `hls_rendition`
    pub index: Option<i32>,
}

/// Lifetime of a signed read URL for the rendition type.
pub fn url_ttl(rendition: VariantType) -> Duration {
    let secs = match rendition {
        VariantType::HlsRendition => VIDEO_URL_TTL_SECS,
        VariantType::HlsManifest => MANIFEST_URL_TTL_SECS,
        _ => IMAGE_URL_TTL_SECS,
    };
    Duration::from_secs(secs)
}

/// Full record of a media asset
#[utoipa::path(
    get,
    path = "/api/v0/media/{id}",
    tag = "media",
    params(("id" = Uuid, Path, description = "Media asset ID")),
    responses(
        (status = 200, description = "Media asset", body = MediaAsset),
        (status = 404, description = "Unknown asset", body = ErrorResponse)
    )
)]
pub async fn get_media(
    State(state): State<MediaState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let asset = state
        .store
        .get_asset(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Media {} not found", id)))?;
    Ok(Json(asset))
}

/// Time-limited read URL for one rendition of a media asset
#[utoipa::path(
    get,
    path = "/api/v0/media/{id}/url",
    tag = "media",
    params(("id" = Uuid, Path, description = "Media asset ID"), RenditionQuery),
    responses(
        (status = 200, description = "Signed URL", body = SignedUrlResponse),
        (status = 400, description = "Unknown rendition", body = ErrorResponse),
        (status = 404, description = "Asset or rendition not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, query), fields(asset_id = %id, operation = "signed_media_url"))]
pub async fn signed_media_url(
    State(state): State<MediaState>,
    Path(id): Path<Uuid>,
    Query(query): Query<RenditionQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let asset = state
        .store
        .get_asset(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Media {} not found", id)))?;

    // Variants written before a failure are never served
    if asset.processing_status != ProcessingStatus::Completed {
        return Err(AppError::NotFound(format!(
            "Media {} is not ready (status: {})",
            id, asset.processing_status
        ))
        .into());
    }

    let rendition = match query.rendition.as_deref() {
        Some(name) => name
            .parse::<VariantType>()
            .map_err(|e| AppError::InvalidInput(e.to_string()))?,
        None => match asset.kind {
            MediaKind::Image => VariantType::Full,
            MediaKind::Video => VariantType::HlsManifest,
        },
    };
    let segment_index = match rendition {
        VariantType::HlsRendition => Some(query.index.unwrap_or(0)),
        _ => None,
    };

    let variant = state
        .store
        .find_variant(id, rendition, segment_index)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "Rendition {} of media {} is not available (status: {})",
                rendition, id, asset.processing_status
            ))
        })?;

    let ttl = url_ttl(rendition);
    let url = state
        .storage
        .presigned_get_url(&variant.storage_key, ttl)
        .await?;

    Ok(Json(SignedUrlResponse {
        url,
        rendition,
        expires_at: Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_renditions_get_short_urls() {
        assert_eq!(url_ttl(VariantType::HlsRendition), Duration::from_secs(60));
        assert_eq!(url_ttl(VariantType::HlsManifest), Duration::from_secs(3600));
        assert_eq!(url_ttl(VariantType::Thumbnail), Duration::from_secs(3600));
        assert_eq!(url_ttl(VariantType::VideoThumbnail), Duration::from_secs(3600));
    }
}
