//! Object route for the local storage backend: serves and accepts files under
//! `/files/{key}` when the request carries a URL signature issued by
//! [`LocalStorage`](sportisode_storage::LocalStorage). S3 deployments never route here.

use crate::error::HttpAppError;
use crate::state::MediaState;
use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde::Deserialize;
use sportisode_core::AppError;
use sportisode_storage::{LocalStorage, Storage};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub method: String,
    pub expires: u64,
    pub signature: String,
}

fn authorize<'a>(
    state: &'a MediaState,
    method: &str,
    key: &str,
    query: &SignedQuery,
) -> Result<&'a Arc<LocalStorage>, HttpAppError> {
    let local = state
        .local
        .as_ref()
        .ok_or_else(|| AppError::NotFound("Not found".to_string()))?;
    if !query.method.eq_ignore_ascii_case(method)
        || !local.verify_signed(method, key, query.expires, &query.signature)
    {
        return Err(AppError::Forbidden("Invalid or expired URL signature".to_string()).into());
    }
    Ok(local)
}

fn content_type_for(key: &str) -> &'static str {
    match key.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
        Some("webp") => "image/webp",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("m3u8") => "application/vnd.apple.mpegurl",
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        _ => "application/octet-stream",
    }
}

#[tracing::instrument(skip(state, query), fields(operation = "get_signed_file"))]
pub async fn get_signed_file(
    State(state): State<MediaState>,
    Path(key): Path<String>,
    Query(query): Query<SignedQuery>,
) -> Result<Response, HttpAppError> {
    let local = authorize(&state, "GET", &key, &query)?;

    let stream = local.download_stream(&key).await?;
    let body_stream = stream.map(|result| {
        result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&key))
        .header(header::CACHE_CONTROL, "private, max-age=60")
        .body(Body::from_stream(body_stream))
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to build response");
            HttpAppError::from(AppError::Internal(e.to_string()))
        })?;

    Ok(response)
}

#[tracing::instrument(skip(state, query, headers, body), fields(operation = "put_signed_file", size = body.len()))]
pub async fn put_signed_file(
    State(state): State<MediaState>,
    Path(key): Path<String>,
    Query(query): Query<SignedQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, HttpAppError> {
    let local = authorize(&state, "PUT", &key, &query)?;
    if body.is_empty() {
        return Err(AppError::InvalidInput("Empty upload body".to_string()).into());
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream");

    local
        .upload_with_key(&key, body.to_vec(), content_type)
        .await?;

    tracing::info!(key = %key, "Stored direct upload");
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guesses_content_type_from_extension() {
        assert_eq!(content_type_for("media/a/thumbnail.webp"), "image/webp");
        assert_eq!(content_type_for("media/a/playlist.m3u8"), "application/vnd.apple.mpegurl");
        assert_eq!(content_type_for("media/a/hls/0/rendition.MP4"), "video/mp4");
        assert_eq!(content_type_for("uploads/a/raw"), "application/octet-stream");
    }
}
