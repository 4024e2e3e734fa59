//! Host actions and viewer accounting for live streams.
//!
//! Every transition a handler causes is forwarded to the configured
//! [`StreamNotifier`](sportisode_services::StreamNotifier) before responding.

use crate::caller::{MaybeUserId, UserId};
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::StreamState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use sportisode_core::models::{LiveStream, NewLiveStream, StreamTransition};
use sportisode_services::LifecycleError;
use utoipa::ToSchema;
use uuid::Uuid;

/// Returned to the host only: carries the encoder credentials.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedStreamResponse {
    pub stream: LiveStream,
    pub stream_key: String,
    pub ingest_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StreamActionResponse {
    pub stream: LiveStream,
    /// `null` when the stream was already in (or past) the requested state
    pub transition: Option<StreamTransition>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ViewerCountResponse {
    /// Whether the join or leave was counted
    pub counted: bool,
    pub viewer_count: i32,
}

#[derive(Debug, Clone, Copy)]
enum HostAction {
    Prepare,
    Start,
    End,
    Cancel,
}

async fn run_action(
    state: &StreamState,
    id: Uuid,
    host_id: &str,
    action: HostAction,
) -> Result<StreamActionResponse, HttpAppError> {
    let lifecycle = &state.lifecycle;
    let transition = match action {
        HostAction::Prepare => lifecycle.mark_starting(id, host_id).await?,
        HostAction::Start => lifecycle.start(id, host_id).await?,
        HostAction::End => lifecycle.end(id, host_id).await?,
        HostAction::Cancel => lifecycle.cancel(id, host_id).await?,
    };

    if let Some(t) = &transition {
        state.notifier.notify(t).await;
    } else {
        tracing::debug!(stream_id = %id, ?action, "Host action left stream unchanged");
    }

    let stream = lifecycle.get(id).await?;
    Ok(StreamActionResponse { stream, transition })
}

/// Schedule a new live stream
#[utoipa::path(
    post,
    path = "/api/v0/streams",
    tag = "streams",
    request_body = NewLiveStream,
    params(("X-User-Id" = String, Header, description = "Host user id set by the auth gateway")),
    responses(
        (status = 201, description = "Stream scheduled", body = CreatedStreamResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 401, description = "Missing caller id", body = ErrorResponse),
        (status = 502, description = "Broadcast provider refused", body = ErrorResponse),
        (status = 503, description = "Broadcast provider unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(host_id = %host_id, operation = "create_stream"))]
pub async fn create_stream(
    State(state): State<StreamState>,
    UserId(host_id): UserId,
    ValidatedJson(request): ValidatedJson<NewLiveStream>,
) -> Result<impl IntoResponse, HttpAppError> {
    let stream = state.lifecycle.create(&host_id, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedStreamResponse {
            stream_key: stream.stream_key.clone(),
            ingest_url: stream.ingest_url.clone(),
            stream,
        }),
    ))
}

/// Fetch a stream; private streams only for the host and allowed viewers
#[utoipa::path(
    get,
    path = "/api/v0/streams/{id}",
    tag = "streams",
    params(("id" = Uuid, Path, description = "Stream ID")),
    responses(
        (status = 200, description = "Stream", body = LiveStream),
        (status = 403, description = "Private stream", body = ErrorResponse),
        (status = 404, description = "Unknown stream", body = ErrorResponse)
    )
)]
pub async fn get_stream(
    State(state): State<StreamState>,
    MaybeUserId(caller): MaybeUserId,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let stream = state.lifecycle.get(id).await?;
    if !stream.can_view(caller.as_deref().unwrap_or_default()) {
        return Err(LifecycleError::NotAllowed.into());
    }
    Ok(Json(stream))
}

/// Host signals the encoder is being set up (`scheduled -> starting`)
#[utoipa::path(
    post,
    path = "/api/v0/streams/{id}/prepare",
    tag = "streams",
    params(("id" = Uuid, Path, description = "Stream ID")),
    responses(
        (status = 200, description = "Current state", body = StreamActionResponse),
        (status = 403, description = "Caller is not the host", body = ErrorResponse),
        (status = 404, description = "Unknown stream", body = ErrorResponse)
    )
)]
pub async fn prepare_stream(
    State(state): State<StreamState>,
    UserId(host_id): UserId,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    Ok(Json(run_action(&state, id, &host_id, HostAction::Prepare).await?))
}

/// Host goes live
#[utoipa::path(
    post,
    path = "/api/v0/streams/{id}/start",
    tag = "streams",
    params(("id" = Uuid, Path, description = "Stream ID")),
    responses(
        (status = 200, description = "Current state", body = StreamActionResponse),
        (status = 403, description = "Caller is not the host", body = ErrorResponse),
        (status = 404, description = "Unknown stream", body = ErrorResponse)
    )
)]
pub async fn start_stream(
    State(state): State<StreamState>,
    UserId(host_id): UserId,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    Ok(Json(run_action(&state, id, &host_id, HostAction::Start).await?))
}

/// Host ends the broadcast; repeating it is a no-op
#[utoipa::path(
    post,
    path = "/api/v0/streams/{id}/end",
    tag = "streams",
    params(("id" = Uuid, Path, description = "Stream ID")),
    responses(
        (status = 200, description = "Current state", body = StreamActionResponse),
        (status = 403, description = "Caller is not the host", body = ErrorResponse),
        (status = 404, description = "Unknown stream", body = ErrorResponse)
    )
)]
pub async fn end_stream(
    State(state): State<StreamState>,
    UserId(host_id): UserId,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    Ok(Json(run_action(&state, id, &host_id, HostAction::End).await?))
}

/// Host cancels a stream that has not gone live
#[utoipa::path(
    post,
    path = "/api/v0/streams/{id}/cancel",
    tag = "streams",
    params(("id" = Uuid, Path, description = "Stream ID")),
    responses(
        (status = 200, description = "Current state", body = StreamActionResponse),
        (status = 403, description = "Caller is not the host", body = ErrorResponse),
        (status = 404, description = "Unknown stream", body = ErrorResponse)
    )
)]
pub async fn cancel_stream(
    State(state): State<StreamState>,
    UserId(host_id): UserId,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    Ok(Json(run_action(&state, id, &host_id, HostAction::Cancel).await?))
}

fn viewer_response(stream: Option<LiveStream>, fallback: i32) -> Json<ViewerCountResponse> {
    Json(match stream {
        Some(s) => ViewerCountResponse {
            counted: true,
            viewer_count: s.viewer_count,
        },
        None => ViewerCountResponse {
            counted: false,
            viewer_count: fallback,
        },
    })
}

/// Count the caller in as a viewer
#[utoipa::path(
    post,
    path = "/api/v0/streams/{id}/viewers/join",
    tag = "streams",
    params(("id" = Uuid, Path, description = "Stream ID")),
    responses(
        (status = 200, description = "Viewer count", body = ViewerCountResponse),
        (status = 403, description = "Private stream", body = ErrorResponse),
        (status = 404, description = "Unknown stream", body = ErrorResponse)
    )
)]
pub async fn viewer_joined(
    State(state): State<StreamState>,
    MaybeUserId(caller): MaybeUserId,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let viewer = caller.unwrap_or_default();
    let updated = state.lifecycle.record_viewer_joined(id, &viewer).await?;
    let fallback = match &updated {
        Some(_) => 0,
        None => state.lifecycle.get(id).await?.viewer_count,
    };
    Ok(viewer_response(updated, fallback))
}

/// Count a viewer out
#[utoipa::path(
    post,
    path = "/api/v0/streams/{id}/viewers/leave",
    tag = "streams",
    params(("id" = Uuid, Path, description = "Stream ID")),
    responses(
        (status = 200, description = "Viewer count", body = ViewerCountResponse),
        (status = 404, description = "Unknown stream", body = ErrorResponse)
    )
)]
pub async fn viewer_left(
    State(state): State<StreamState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let current = state.lifecycle.get(id).await?;
    let updated = state.lifecycle.record_viewer_left(id).await?;
    Ok(viewer_response(updated, current.viewer_count))
}
