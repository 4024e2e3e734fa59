use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::media::{ProcessingStatus, VariantType};

/// Request a signed URL for a direct upload to object storage
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PresignedUploadRequest {
    /// Original filename
    #[validate(length(
        min = 1,
        max = 255,
        message = "Filename must be between 1 and 255 characters"
    ))]
    pub filename: String,
    /// Content type (MIME type)
    #[validate(length(
        min = 1,
        max = 255,
        message = "Content type must be between 1 and 255 characters"
    ))]
    pub content_type: String,
    /// File size in bytes
    #[validate(range(min = 1, message = "File size must be at least 1 byte"))]
    pub file_size: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PresignedUploadResponse {
    /// Asset id to quote when completing the upload
    pub upload_id: Uuid,
    /// Signed URL accepting a single PUT
    pub presigned_url: String,
    /// Storage key the object will live under
    pub storage_key: String,
    pub expires_at: DateTime<Utc>,
}

/// Notify that the client finished writing the object
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CompleteUploadRequest {
    pub upload_id: Uuid,
    #[validate(length(min = 1, max = 1024))]
    pub storage_key: String,
    #[validate(length(min = 1, max = 255))]
    pub filename: String,
    #[validate(length(min = 1, max = 255))]
    pub content_type: String,
    #[validate(range(min = 1))]
    pub file_size: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompleteUploadResponse {
    pub id: Uuid,
    pub processing_status: ProcessingStatus,
    pub uploaded_at: DateTime<Utc>,
}

/// Time-limited read URL for one rendition
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SignedUrlResponse {
    pub url: String,
    pub rendition: VariantType,
    pub expires_at: DateTime<Utc>,
}
