use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

pub struct CircuitBreaker {
    pub name: String,
    pub state: RwLock<CircuitState>,
    pub failure_count: AtomicUsize,
    pub failure_threshold: usize,
    pub reset_timeout: Duration,
    pub last_failure: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(name: &str, threshold: usize, timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicUsize::new(0),
            failure_threshold: threshold,
            reset_timeout: timeout,
            last_failure: RwLock::new(None),
        }
    }

    pub async fn check(&self) -> bool {
        let state = *self.state.read().await;
        if state == CircuitState::Closed {
            return true;
        }

        if state == CircuitState::Open {
            let last_fail = *self.last_failure.read().await;
            if let Some(instant) = last_fail {
                if instant.elapsed() > self.reset_timeout {
                    let mut s = self.state.write().await;
                    *s = CircuitState::HalfOpen;
                    tracing::info!("Circuit Breaker [{}] moving to Half-Open", self.name);
                    return true;
                }
            }
            return false;
        }

        // Half-open lets a probe through
        true
    }

    pub async fn record_success(&self) {
        let mut state = self.state.write().await;
        if *state == CircuitState::HalfOpen {
            *state = CircuitState::Closed;
            self.failure_count.store(0, Ordering::SeqCst);
            tracing::info!("Circuit Breaker [{}] recovered to Closed", self.name);
        } else if *state == CircuitState::Closed {
            self.failure_count.store(0, Ordering::SeqCst);
        }
    }

    pub async fn record_failure(&self) {
        let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.write().await;

        if count >= self.failure_threshold || *state == CircuitState::HalfOpen {
            *state = CircuitState::Open;
            let mut last = self.last_failure.write().await;
            *last = Some(Instant::now());
            tracing::error!("Circuit Breaker [{}] tripped to Open. Failures: {}", self.name, count);
        }
    }

    pub async fn current(&self) -> CircuitState {
        *self.state.read().await
    }
}

pub struct ResiliencyState {
    pub ledger_cb: CircuitBreaker,
}

impl ResiliencyState {
    pub fn new(threshold: usize, reset_timeout: Duration) -> Self {
        Self {
            ledger_cb: CircuitBreaker::new("settlement-ledger", threshold, reset_timeout),
        }
    }
}

/// Routes that make a settlement ledger round-trip.
fn touches_ledger(path: &str) -> bool {
    path.contains("/escrow/")
        || path.ends_with("/dispute/resolve")
        || path.ends_with("/cancel")
        || path.ends_with("/transition")
}

/// Fails ledger-bound requests fast while the ledger keeps returning
/// gateway errors. Only 502 responses count as ledger failures.
pub async fn circuit_breaker_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if !touches_ledger(req.uri().path()) {
        return next.run(req).await;
    }

    let cb = &state.resiliency.ledger_cb;
    if !cb.check().await {
        return AppError::ServiceUnavailable(format!("Circuit Breaker [{}] is OPEN", cb.name))
            .into_response();
    }

    let response = next.run(req).await;

    if response.status() == StatusCode::BAD_GATEWAY {
        cb.record_failure().await;
    } else {
        cb.record_success().await;
    }

    response
}
