use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use tokio::sync::{Mutex, MutexGuard};
use utoipa::ToSchema;

use super::cache::ResponseCache;
use super::circuit_breaker::CircuitBreaker;
use super::descriptor::IntegrationDescriptor;
use super::rate_limiter::RateLimiter;

#[derive(Debug)]
pub(crate) struct CircuitState {
    pub(crate) breaker: CircuitBreaker,
    pub(crate) limiter: RateLimiter,
}

/// Process-local state of one integration.
///
/// Breaker and rate counters sit behind a single async mutex so the
/// check-and-reserve step cannot lose increments.
#[derive(Debug)]
pub struct IntegrationState {
    name: String,
    circuit: Mutex<CircuitState>,
    cache: ResponseCache,
}

/// Snapshot served by the integration status endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationStatus {
    pub open: bool,
    pub failure_count: u32,
    pub last_failure: Option<DateTime<Utc>>,
    pub requests_this_minute: u32,
    pub requests_this_hour: u32,
}

impl IntegrationState {
    pub fn new(descriptor: &IntegrationDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            circuit: Mutex::new(CircuitState {
                breaker: CircuitBreaker::new(descriptor.failure_threshold, descriptor.cooldown),
                limiter: RateLimiter::new(descriptor.burst_limit, descriptor.hourly_limit),
            }),
            cache: ResponseCache::new(descriptor.cache_capacity),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, CircuitState> {
        self.circuit.lock().await
    }

    pub async fn snapshot(&self) -> IntegrationStatus {
        let mut circuit = self.circuit.lock().await;
        circuit.limiter.roll(Instant::now());
        IntegrationStatus {
            open: circuit.breaker.is_open(),
            failure_count: circuit.breaker.failure_count(),
            last_failure: circuit.breaker.last_failure_at(),
            requests_this_minute: circuit.limiter.requests_this_minute(),
            requests_this_hour: circuit.limiter.requests_this_hour(),
        }
    }
}
