//! Caller identity forwarded by the upstream auth gateway.
//!
//! The gateway authenticates the user and sets `X-User-Id`; this service only
//! reads it.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sportisode_core::constants::USER_ID_HEADER;
use sportisode_core::AppError;
use std::convert::Infallible;

use crate::error::HttpAppError;

fn header_user_id(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Authenticated caller; rejects with 401 when the header is absent.
#[derive(Debug, Clone)]
pub struct UserId(pub String);

impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header_user_id(parts).map(UserId).ok_or_else(|| {
            HttpAppError(AppError::Unauthorized(format!(
                "Missing {} header",
                USER_ID_HEADER
            )))
        })
    }
}

/// Caller id when present (anonymous viewers of public streams).
#[derive(Debug, Clone, Default)]
pub struct MaybeUserId(pub Option<String>);

impl<S> FromRequestParts<S> for MaybeUserId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUserId(header_user_id(parts)))
    }
}
