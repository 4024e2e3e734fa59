use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::MediaState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use sportisode_core::constants::UPLOAD_URL_TTL_SECS;
use sportisode_core::models::{
    CompleteUploadRequest, CompleteUploadResponse, MediaAsset, MediaKind, PresignedUploadRequest,
    PresignedUploadResponse, ProcessingStatus,
};
use sportisode_core::AppError;
use sportisode_storage::keys;
use sportisode_worker::EnqueueOutcome;
use std::time::Duration;
use uuid::Uuid;
use validator::Validate;

fn check_upload(state: &MediaState, content_type: &str, file_size: u64) -> Result<MediaKind, AppError> {
    let kind = state.limits.kind_of(content_type).ok_or_else(|| {
        AppError::InvalidInput(format!("Unsupported content type: {}", content_type))
    })?;
    let max = state.limits.max_size(kind);
    if file_size > max as u64 {
        return Err(AppError::PayloadTooLarge(format!(
            "{} bytes exceeds the {} limit of {} bytes",
            file_size, kind, max
        )));
    }
    Ok(kind)
}

/// Generate a signed URL for a direct upload to object storage
#[utoipa::path(
    post,
    path = "/api/v0/uploads/presigned",
    tag = "uploads",
    request_body = PresignedUploadRequest,
    responses(
        (status = 200, description = "Presigned URL generated", body = PresignedUploadResponse),
        (status = 400, description = "Invalid input or unsupported content type", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, request),
    fields(content_type = %request.content_type, operation = "generate_presigned_url")
)]
pub async fn generate_presigned_url(
    State(state): State<MediaState>,
    ValidatedJson(request): ValidatedJson<PresignedUploadRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate()?;
    check_upload(&state, &request.content_type, request.file_size)?;

    let upload_id = Uuid::new_v4();
    let storage_key = keys::upload_key(upload_id, &request.filename);
    let expires_in = Duration::from_secs(UPLOAD_URL_TTL_SECS);
    let expires_at = Utc::now() + chrono::Duration::seconds(UPLOAD_URL_TTL_SECS as i64);

    let presigned_url = state
        .storage
        .presigned_put_url(&storage_key, &request.content_type, expires_in)
        .await?;

    tracing::info!(
        upload_id = %upload_id,
        filename = %request.filename,
        "Generated presigned URL for direct upload"
    );

    Ok(Json(PresignedUploadResponse {
        upload_id,
        presigned_url,
        storage_key,
        expires_at,
    }))
}

/// Register a finished direct upload and queue it for processing
#[utoipa::path(
    post,
    path = "/api/v0/uploads/complete",
    tag = "uploads",
    request_body = CompleteUploadRequest,
    responses(
        (status = 202, description = "Asset created and queued", body = CompleteUploadResponse),
        (status = 400, description = "Invalid input, unsupported type or object missing", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, request),
    fields(upload_id = %request.upload_id, operation = "complete_upload")
)]
pub async fn complete_upload(
    State(state): State<MediaState>,
    ValidatedJson(request): ValidatedJson<CompleteUploadRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate()?;
    let kind = check_upload(&state, &request.content_type, request.file_size)?;

    keys::validate_key(&request.storage_key)?;
    if !keys::is_upload_key_for(request.upload_id, &request.storage_key) {
        return Err(AppError::InvalidInput(
            "storage_key does not belong to upload_id".to_string(),
        )
        .into());
    }

    // Completing twice returns the existing asset
    if let Some(existing) = state.store.get_asset(request.upload_id).await? {
        if existing.processing_status == ProcessingStatus::Pending {
            state.queue.enqueue(existing.id, existing.storage_key.clone());
        }
        return Ok((
            StatusCode::ACCEPTED,
            Json(CompleteUploadResponse {
                id: existing.id,
                processing_status: existing.processing_status,
                uploaded_at: existing.created_at,
            }),
        ));
    }

    if !state.storage.exists(&request.storage_key).await? {
        return Err(AppError::BadRequest(
            "Upload not found in storage; PUT the file before completing".to_string(),
        )
        .into());
    }

    let asset = MediaAsset::new_pending(
        request.upload_id,
        request.filename.clone(),
        request.file_size as i64,
        request.content_type.to_lowercase(),
        kind,
        request.storage_key.clone(),
    );
    state.store.create_asset(&asset).await?;

    match state.queue.enqueue(asset.id, asset.storage_key.clone()) {
        EnqueueOutcome::Closed => {
            tracing::warn!(asset_id = %asset.id, "Transcode queue closed; asset stays pending")
        }
        outcome => tracing::debug!(asset_id = %asset.id, ?outcome, "Enqueued transcode"),
    }

    tracing::info!(
        asset_id = %asset.id,
        kind = %kind,
        file_size = request.file_size,
        "Upload completed"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(CompleteUploadResponse {
            id: asset.id,
            processing_status: asset.processing_status,
            uploaded_at: asset.created_at,
        }),
    ))
}
