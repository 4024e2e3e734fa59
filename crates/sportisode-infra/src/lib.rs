//! Sportisode Infrastructure Library
//!
//! Shared infrastructure used by the services and the API binary:
//! - Telemetry initialization
//! - HTTP error response body
//! - Resilient outbound client (circuit breaker, rate limiter, response cache)
//! - Inbound webhook signature verification

#[cfg(feature = "observability-basic")]
pub mod telemetry;

pub mod error;

#[cfg(feature = "resilience")]
pub mod resilience;

#[cfg(feature = "webhook")]
pub mod webhook;

// Re-export commonly used types
#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry};

pub use error::ErrorResponse;

#[cfg(feature = "resilience")]
pub use resilience::{
    DataClass, Fail, FailKind, IntegrationDescriptor, IntegrationRequest, IntegrationState,
    IntegrationStatus, ResilientClient,
};

#[cfg(feature = "webhook")]
pub use webhook::{verify_signature, SignatureError, SignatureHeader};
