//! Resilient outbound HTTP for third-party integrations
//!
//! Every integration owns one [`IntegrationState`] holding its circuit breaker,
//! fixed-window rate limiter and response cache. A [`ResilientClient`] is built
//! from an [`IntegrationDescriptor`] plus that state, so no two integrations share
//! counters and nothing lives in a global.

mod cache;
mod circuit_breaker;
mod client;
mod descriptor;
mod error;
mod rate_limiter;
mod state;

pub use cache::ResponseCache;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerState};
pub use client::{IntegrationRequest, ResilientClient};
pub use descriptor::{DataClass, HealthProbe, IntegrationDescriptor, HEALTH_CHECK_TIMEOUT};
pub use error::{Fail, FailKind};
pub use rate_limiter::RateLimiter;
pub use state::{IntegrationState, IntegrationStatus};
