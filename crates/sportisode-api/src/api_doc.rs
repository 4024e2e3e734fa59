//! OpenAPI documentation.
//! Paths in handler annotations use /api/v0; they are rewritten at runtime when
//! `API_VERSION` moves on.

use utoipa::OpenApi;

use crate::constants::API_VERSION;
use crate::error::ErrorResponse;
use crate::handlers;
use sportisode_core::models;

/// Version used in handler path annotations (utoipa requires compile-time literals).
const OPENAPI_PATH_PLACEHOLDER: &str = "/api/v0";

fn transform_openapi_paths(spec: &mut utoipa::openapi::OpenApi, version: &str) {
    let replacement = format!("/api/{}", version);
    if OPENAPI_PATH_PLACEHOLDER == replacement {
        return;
    }
    let path_map = std::mem::take(&mut spec.paths.paths);
    for (key, item) in path_map {
        let new_key = key.replacen(OPENAPI_PATH_PLACEHOLDER, &replacement, 1);
        spec.paths.paths.insert(new_key, item);
    }
}

/// Returns the OpenAPI spec with path placeholders replaced by the current API version.
pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    let mut spec = ApiDoc::openapi();
    transform_openapi_paths(&mut spec, API_VERSION);
    spec
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Sportisode API",
        version = "0.1.0",
        description = "Media and live streaming core of the Sportisode sports social network: direct uploads with background transcoding, signed rendition URLs, live stream host actions, broadcast provider webhooks and read-through sports data. All endpoints are versioned under /api/v0/."
    ),
    paths(
        // Uploads
        handlers::uploads::generate_presigned_url,
        handlers::uploads::complete_upload,
        // Media
        handlers::media::get_media,
        handlers::media::signed_media_url,
        // Streams
        handlers::streams::create_stream,
        handlers::streams::get_stream,
        handlers::streams::prepare_stream,
        handlers::streams::start_stream,
        handlers::streams::end_stream,
        handlers::streams::cancel_stream,
        handlers::streams::viewer_joined,
        handlers::streams::viewer_left,
        // Webhooks
        handlers::webhooks::broadcast_webhook,
        // Sports data
        handlers::sports::live_fixtures,
        handlers::sports::leagues,
        handlers::sports::standings,
        handlers::sports::team,
        handlers::integrations::integration_status,
    ),
    components(schemas(
        ErrorResponse,
        models::PresignedUploadRequest,
        models::PresignedUploadResponse,
        models::CompleteUploadRequest,
        models::CompleteUploadResponse,
        models::SignedUrlResponse,
        models::MediaAsset,
        models::MediaKind,
        models::ProcessingStatus,
        models::VariantType,
        models::LiveStream,
        models::NewLiveStream,
        models::StreamStatus,
        models::StreamTransition,
        handlers::streams::CreatedStreamResponse,
        handlers::streams::StreamActionResponse,
        handlers::streams::ViewerCountResponse,
        handlers::webhooks::WebhookAck,
        sportisode_services::League,
        sportisode_services::StandingRow,
        sportisode_services::LiveFixture,
        sportisode_services::Team,
        sportisode_infra::IntegrationStatus,
    )),
    tags(
        (name = "uploads", description = "Direct upload handoff"),
        (name = "media", description = "Media assets and signed rendition URLs"),
        (name = "streams", description = "Live stream host actions and viewers"),
        (name = "webhooks", description = "Broadcast provider events"),
        (name = "sports", description = "Third-party sports data"),
        (name = "integrations", description = "Circuit breaker and rate limit introspection")
    )
)]
pub struct ApiDoc;
