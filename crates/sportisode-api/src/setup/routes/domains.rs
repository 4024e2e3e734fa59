//! Domain route groups (uploads, media, streams, webhooks, sports data).

use crate::constants::API_PREFIX;
use crate::handlers;
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub fn upload_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/uploads/presigned", API_PREFIX),
            post(handlers::uploads::generate_presigned_url),
        )
        .route(
            &format!("{}/uploads/complete", API_PREFIX),
            post(handlers::uploads::complete_upload),
        )
        .with_state(state)
}

pub fn media_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/media/{{id}}", API_PREFIX),
            get(handlers::media::get_media),
        )
        .route(
            &format!("{}/media/{{id}}/url", API_PREFIX),
            get(handlers::media::signed_media_url),
        )
        .with_state(state)
}

pub fn stream_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/streams", API_PREFIX),
            post(handlers::streams::create_stream),
        )
        .route(
            &format!("{}/streams/{{id}}", API_PREFIX),
            get(handlers::streams::get_stream),
        )
        .route(
            &format!("{}/streams/{{id}}/prepare", API_PREFIX),
            post(handlers::streams::prepare_stream),
        )
        .route(
            &format!("{}/streams/{{id}}/start", API_PREFIX),
            post(handlers::streams::start_stream),
        )
        .route(
            &format!("{}/streams/{{id}}/end", API_PREFIX),
            post(handlers::streams::end_stream),
        )
        .route(
            &format!("{}/streams/{{id}}/cancel", API_PREFIX),
            post(handlers::streams::cancel_stream),
        )
        .route(
            &format!("{}/streams/{{id}}/viewers/join", API_PREFIX),
            post(handlers::streams::viewer_joined),
        )
        .route(
            &format!("{}/streams/{{id}}/viewers/leave", API_PREFIX),
            post(handlers::streams::viewer_left),
        )
        .with_state(state)
}

pub fn webhook_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/webhooks/broadcast", API_PREFIX),
            post(handlers::webhooks::broadcast_webhook),
        )
        .with_state(state)
}

pub fn sports_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/sports/live", API_PREFIX),
            get(handlers::sports::live_fixtures),
        )
        .route(
            &format!("{}/sports/leagues", API_PREFIX),
            get(handlers::sports::leagues),
        )
        .route(
            &format!("{}/sports/leagues/{{id}}/standings", API_PREFIX),
            get(handlers::sports::standings),
        )
        .route(
            &format!("{}/sports/teams/{{id}}", API_PREFIX),
            get(handlers::sports::team),
        )
        .route(
            &format!("{}/integrations/status", API_PREFIX),
            get(handlers::integrations::integration_status),
        )
        .with_state(state)
}

/// Self-signed object URLs of the local storage backend. Bodies here are raw
/// uploads, so the limit is the largest allowed media size.
pub fn file_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let max_upload = state.media.limits.max_upload_body();
    Router::new()
        .route(
            "/files/{*key}",
            get(handlers::files::get_signed_file).put(handlers::files::put_signed_file),
        )
        .layer(DefaultBodyLimit::max(max_upload))
        .with_state(state)
}
