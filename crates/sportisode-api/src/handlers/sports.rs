//! Read-through sports data. List endpoints degrade to an empty list when every
//! provider is unavailable, so clients never see integration hiccups.

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::SportsState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use sportisode_core::AppError;
use sportisode_services::{League, LiveFixture, StandingRow, Team};
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
pub struct SeasonQuery {
    /// Provider season label, e.g. `2024-2025` or `2024`
    pub season: Option<String>,
}

/// Matches in play right now
#[utoipa::path(
    get,
    path = "/api/v0/sports/live",
    tag = "sports",
    responses((status = 200, description = "Live fixtures (empty when providers are down)", body = [LiveFixture]))
)]
pub async fn live_fixtures(State(state): State<SportsState>) -> impl IntoResponse {
    Json(state.sports.live_fixtures().await)
}

/// Known leagues
#[utoipa::path(
    get,
    path = "/api/v0/sports/leagues",
    tag = "sports",
    responses((status = 200, description = "Leagues", body = [League]))
)]
pub async fn leagues(State(state): State<SportsState>) -> impl IntoResponse {
    Json(state.sports.leagues().await)
}

/// League table ordered by rank
#[utoipa::path(
    get,
    path = "/api/v0/sports/leagues/{id}/standings",
    tag = "sports",
    params(("id" = String, Path, description = "Provider league ID"), SeasonQuery),
    responses((status = 200, description = "Standings", body = [StandingRow]))
)]
pub async fn standings(
    State(state): State<SportsState>,
    Path(league_id): Path<String>,
    Query(query): Query<SeasonQuery>,
) -> impl IntoResponse {
    Json(
        state
            .sports
            .standings(&league_id, query.season.as_deref())
            .await,
    )
}

/// Team details
#[utoipa::path(
    get,
    path = "/api/v0/sports/teams/{id}",
    tag = "sports",
    params(("id" = String, Path, description = "Provider team ID")),
    responses(
        (status = 200, description = "Team", body = Team),
        (status = 404, description = "Unknown team", body = ErrorResponse),
        (status = 503, description = "Sports data unavailable", body = ErrorResponse)
    )
)]
pub async fn team(
    State(state): State<SportsState>,
    Path(team_id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let team = state
        .sports
        .team(&team_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Team {} not found", team_id)))?;
    Ok(Json(team))
}
