//! Health check handlers and response types.

use crate::state::AppState;
use axum::{http::StatusCode, response::IntoResponse, Json};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Run an async check with timeout; returns "healthy", "timeout", or "{prefix}: {error}".
async fn run_check<F, E>(timeout: Duration, f: F, error_prefix: &str) -> String
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match tokio::time::timeout(timeout, f).await {
        Ok(Ok(())) => "healthy".to_string(),
        Ok(Err(e)) => format!("{}: {}", error_prefix, e),
        Err(_) => "timeout".to_string(),
    }
}

#[derive(serde::Serialize)]
pub(super) struct HealthCheckResponse {
    pub status: String,
    pub media_store: String,
    pub stream_store: String,
    pub storage: String,
    pub transcodes_in_flight: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrations: Option<BTreeMap<String, bool>>,
}

/// Liveness probe - process is running.
pub async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "alive" })),
    )
}

async fn check_dependencies(state: &AppState) -> HealthCheckResponse {
    let media_store = state.media.store.clone();
    let media_store = run_check(
        TIMEOUT,
        async move { media_store.get_asset(Uuid::nil()).await.map(drop) },
        "unhealthy",
    )
    .await;

    let lifecycle = state.streams.lifecycle.clone();
    let stream_store = run_check(
        TIMEOUT,
        async move { lifecycle.store().get(Uuid::nil()).await.map(drop) },
        "unhealthy",
    )
    .await;

    let storage = state.media.storage.clone();
    let storage = run_check(
        TIMEOUT,
        async move {
            storage
                .exists("health-check-non-existent-key")
                .await
                .map(drop)
        },
        "degraded",
    )
    .await;

    let healthy = media_store == "healthy" && stream_store == "healthy";
    HealthCheckResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        media_store,
        stream_store,
        storage,
        transcodes_in_flight: state.media.queue.in_flight(),
        integrations: None,
    }
}

fn respond(response: HealthCheckResponse) -> (StatusCode, Json<HealthCheckResponse>) {
    let status_code = if response.status == "healthy" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(response))
}

/// Stores and object storage. Integrations are not probed here.
pub async fn health_check(state: Arc<AppState>) -> impl IntoResponse {
    respond(check_dependencies(&state).await)
}

/// Same as /health plus a live probe of every sports data integration.
/// Integration failures are reported but do not make the service unhealthy.
pub async fn deep_health_check(state: Arc<AppState>) -> impl IntoResponse {
    let mut response = check_dependencies(&state).await;
    response.integrations = Some(state.sports.sports.health().await);
    respond(response)
}
