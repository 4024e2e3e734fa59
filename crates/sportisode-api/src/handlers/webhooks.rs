use crate::error::{ErrorResponse, HttpAppError};
use crate::state::StreamState;
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use sportisode_core::constants::{MUX_SIGNATURE_HEADER, PROVIDER_SIGNATURE_HEADER};
use sportisode_services::WebhookOutcome;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub status: &'static str,
}

fn signature(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(PROVIDER_SIGNATURE_HEADER)
        .or_else(|| headers.get(MUX_SIGNATURE_HEADER))
        .and_then(|v| v.to_str().ok())
}

/// Inbound broadcast provider events
///
/// Verified against the configured secret, then applied to the matching stream.
/// Unknown events and streams are acknowledged and ignored.
#[utoipa::path(
    post,
    path = "/api/v0/webhooks/broadcast",
    tag = "webhooks",
    request_body(content = String, description = "Raw provider event JSON", content_type = "application/json"),
    responses(
        (status = 200, description = "Event accepted", body = WebhookAck),
        (status = 400, description = "Malformed payload", body = ErrorResponse),
        (status = 401, description = "Missing or invalid signature", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(operation = "broadcast_webhook", size = body.len()))]
pub async fn broadcast_webhook(
    State(state): State<StreamState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, HttpAppError> {
    let outcome = state.webhooks.handle(signature(&headers), &body).await?;

    match &outcome {
        WebhookOutcome::Transitioned(t) => {
            tracing::info!(stream_id = %t.stream_id, from = %t.from, to = %t.to, "Webhook moved stream")
        }
        WebhookOutcome::Unchanged => tracing::debug!("Webhook left stream unchanged"),
        WebhookOutcome::Ignored => tracing::debug!("Webhook ignored"),
    }

    Ok(Json(WebhookAck { status: "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn provider_header_takes_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert(MUX_SIGNATURE_HEADER, HeaderValue::from_static("t=1,v1=bb"));
        assert_eq!(signature(&headers), Some("t=1,v1=bb"));
        headers.insert(PROVIDER_SIGNATURE_HEADER, HeaderValue::from_static("t=1,v1=aa"));
        assert_eq!(signature(&headers), Some("t=1,v1=aa"));
        assert_eq!(signature(&HeaderMap::new()), None);
    }
}
