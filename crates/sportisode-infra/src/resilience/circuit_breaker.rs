use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitBreakerState {
    /// Requests flow through
    Closed,
    /// Requests are rejected until the cooldown elapses
    Open,
    /// Cooldown elapsed; the next outcome decides between Closed and Open
    HalfOpen,
}

/// Consecutive-failure circuit breaker.
///
/// Opens after `failure_threshold` consecutive failures and rejects calls until
/// `cooldown` has passed since the last failure. The first call after the
/// cooldown is let through as a trial: a success closes the circuit and clears
/// the count, a failure re-opens it straight away.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    cooldown: Duration,
    failure_count: u32,
    state: CircuitBreakerState,
    last_failure: Option<Instant>,
    last_failure_at: Option<DateTime<Utc>>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            cooldown,
            failure_count: 0,
            state: CircuitBreakerState::Closed,
            last_failure: None,
            last_failure_at: None,
        }
    }

    /// Whether a call may proceed at `now`. Moves an open circuit whose cooldown
    /// has elapsed into the half-open trial state.
    pub fn allow(&mut self, now: Instant) -> bool {
        match self.state {
            CircuitBreakerState::Closed | CircuitBreakerState::HalfOpen => true,
            CircuitBreakerState::Open => {
                let cooled = self
                    .last_failure
                    .map(|at| now.saturating_duration_since(at) >= self.cooldown)
                    .unwrap_or(true);
                if cooled {
                    self.state = CircuitBreakerState::HalfOpen;
                }
                cooled
            }
        }
    }

    pub fn on_success(&mut self) {
        self.failure_count = 0;
        self.state = CircuitBreakerState::Closed;
    }

    /// Record a failure. Returns `true` when this failure opened the circuit.
    pub fn on_failure(&mut self, now: Instant) -> bool {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure = Some(now);
        self.last_failure_at = Some(Utc::now());

        let was_open = self.state == CircuitBreakerState::Open;
        if self.state == CircuitBreakerState::HalfOpen
            || self.failure_count >= self.failure_threshold
        {
            self.state = CircuitBreakerState::Open;
        }
        !was_open && self.state == CircuitBreakerState::Open
    }

    pub fn state(&self) -> CircuitBreakerState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == CircuitBreakerState::Open
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn last_failure_at(&self) -> Option<DateTime<Utc>> {
        self.last_failure_at
    }
}
