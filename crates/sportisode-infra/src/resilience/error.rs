use sportisode_core::AppError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailKind {
    #[error("circuit open")]
    CircuitOpen,
    #[error("rate limited")]
    RateLimited,
    #[error("HTTP {0}")]
    HttpError(u16),
    #[error("transport error: {0}")]
    TransportError(String),
    #[error("decode error: {0}")]
    DecodeError(String),
}

/// Failure of an integration call. Every kind is recoverable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{integration}: {kind}")]
pub struct Fail {
    pub integration: String,
    pub kind: FailKind,
}

impl Fail {
    pub fn new(integration: impl Into<String>, kind: FailKind) -> Self {
        Self {
            integration: integration.into(),
            kind,
        }
    }

    /// Failures rejected locally or lost in transit, as opposed to answers the
    /// remote side gave.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            FailKind::CircuitOpen | FailKind::RateLimited | FailKind::TransportError(_)
        )
    }
}

impl From<Fail> for AppError {
    fn from(fail: Fail) -> Self {
        if fail.is_transient() {
            AppError::IntegrationUnavailable(fail.to_string())
        } else {
            AppError::RemoteRejected(fail.to_string())
        }
    }
}
