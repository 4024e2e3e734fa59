use crate::state::SportsState;
use axum::{extract::State, response::IntoResponse, Json};
use sportisode_infra::IntegrationStatus;
use std::collections::BTreeMap;

/// Circuit breaker and rate limiter state per integration
#[utoipa::path(
    get,
    path = "/api/v0/integrations/status",
    tag = "integrations",
    responses((status = 200, description = "Status keyed by integration name", body = BTreeMap<String, IntegrationStatus>))
)]
pub async fn integration_status(State(state): State<SportsState>) -> impl IntoResponse {
    Json(state.sports.statuses().await)
}
