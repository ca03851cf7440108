//! Circuit breaker for downstream resource protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: resource assumed down, calls fail fast
//! - Half-Open: trial calls decide whether the resource recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= failure_threshold
//! Open → Half-Open: reset_timeout elapsed since last failure (checked on admission)
//! Half-Open → Closed: success_count >= success_threshold
//! Half-Open → Open: any trial fails
//! ```
//!
//! # Design Decisions
//! - State and counters are atomics; every transition is a compare-exchange
//! - Rejected calls never start the timeout clock and never touch counters
//! - Half-Open admits every caller unless `single_trial` is configured
//! - The per-call timeout wraps the outer future; timed-out work is dropped,
//!   not awaited

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::error::ServiceError;
use crate::observability::metrics;
use crate::resilience::clock::{Clock, SystemClock};
use crate::resilience::config::CircuitBreakerConfig;
use crate::resilience::metrics::CircuitBreakerMetrics;

/// Circuit state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(val: u8) -> Self {
        match val {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named state machine guarding one class of operation.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: AtomicU8,
    failure_count: AtomicU32,
    success_count: AtomicU32,
    /// Epoch millis of the most recent failure, 0 if none yet.
    last_failure_ms: AtomicU64,
    trial_in_flight: AtomicBool,
    clock: Arc<dyn Clock>,
}

/// Proof of admission. Releases the Half-Open trial slot when dropped.
struct Admission<'a> {
    trial: Option<&'a AtomicBool>,
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if let Some(flag) = self.trial {
            flag.store(false, Ordering::Release);
        }
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    pub fn with_clock(name: impl Into<String>, config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            config,
            state: AtomicU8::new(CircuitState::Closed as u8),
            failure_count: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
            last_failure_ms: AtomicU64::new(0),
            trial_in_flight: AtomicBool::new(false),
            clock,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    /// Run `operation` if the circuit admits it, enforcing the per-call timeout.
    ///
    /// Rejections and timeouts are synthesized here and are never passed
    /// through the operation's own error classification.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let Some(admission) = self.admit() else {
            metrics::record_breaker_call(&self.name, "rejected");
            tracing::debug!(breaker = %self.name, "Circuit breaker rejected call");
            return Err(ServiceError::breaker_open(&self.name));
        };

        let start = Instant::now();
        let (outcome, label) = match tokio::time::timeout(self.config.timeout(), operation()).await {
            Ok(Ok(value)) => (Ok(value), "success"),
            Ok(Err(e)) => (Err(e), "failure"),
            Err(_) => (Err(ServiceError::breaker_timeout(self.config.timeout_ms)), "timeout"),
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;
        metrics::record_breaker_call(&self.name, label);

        match &outcome {
            Ok(_) => {
                self.on_success();
                tracing::debug!(breaker = %self.name, elapsed_ms, "Circuit breaker operation succeeded");
            }
            Err(e) => {
                self.on_failure();
                tracing::warn!(breaker = %self.name, elapsed_ms, outcome = label, error = %e, "Circuit breaker operation failed");
            }
        }

        drop(admission);
        outcome
    }

    /// Admission check. May move Open → Half-Open as a side effect.
    fn admit(&self) -> Option<Admission<'_>> {
        loop {
            match self.state() {
                CircuitState::Closed => return Some(Admission { trial: None }),
                CircuitState::Open => {
                    let last_failure = self.last_failure_ms.load(Ordering::Acquire);
                    let now = self.clock.now_millis();
                    if now.saturating_sub(last_failure) < self.config.reset_timeout_ms {
                        return None;
                    }
                    if self.transition(CircuitState::Open, CircuitState::HalfOpen) {
                        tracing::info!(breaker = %self.name, "Circuit breaker transitioning to HALF_OPEN");
                    }
                    // Re-evaluate against whatever state won.
                }
                CircuitState::HalfOpen => {
                    if !self.config.single_trial {
                        return Some(Admission { trial: None });
                    }
                    return self
                        .trial_in_flight
                        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                        .ok()
                        .map(|_| Admission {
                            trial: Some(&self.trial_in_flight),
                        });
                }
            }
        }
    }

    fn on_success(&self) {
        match self.state() {
            CircuitState::HalfOpen => {
                let successes = self.success_count.fetch_add(1, Ordering::AcqRel) + 1;
                tracing::debug!(
                    breaker = %self.name,
                    successes,
                    threshold = self.config.success_threshold,
                    "Circuit breaker success in HALF_OPEN"
                );
                if successes >= self.config.success_threshold
                    && self.transition(CircuitState::HalfOpen, CircuitState::Closed)
                {
                    self.failure_count.store(0, Ordering::Release);
                    self.success_count.store(0, Ordering::Release);
                    tracing::info!(breaker = %self.name, successes, "Circuit breaker transitioning to CLOSED");
                }
            }
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::Release);
            }
            // Late completion of a call admitted before the circuit opened.
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self) {
        self.last_failure_ms.store(self.clock.now_millis(), Ordering::Release);

        match self.state() {
            CircuitState::HalfOpen => {
                if self.transition(CircuitState::HalfOpen, CircuitState::Open) {
                    self.success_count.store(0, Ordering::Release);
                    tracing::warn!(breaker = %self.name, "Circuit breaker transitioning to OPEN after failed trial");
                }
            }
            CircuitState::Closed => {
                let failures = self.failure_count.fetch_add(1, Ordering::AcqRel) + 1;
                tracing::debug!(
                    breaker = %self.name,
                    failures,
                    threshold = self.config.failure_threshold,
                    "Circuit breaker failure count"
                );
                if failures >= self.config.failure_threshold
                    && self.transition(CircuitState::Closed, CircuitState::Open)
                {
                    self.success_count.store(0, Ordering::Release);
                    tracing::warn!(breaker = %self.name, failures, "Circuit breaker transitioning to OPEN");
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Compare-and-set a single edge of the state machine.
    fn transition(&self, from: CircuitState, to: CircuitState) -> bool {
        let won = self
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            metrics::record_breaker_transition(&self.name, to);
        }
        won
    }

    /// Point-in-time snapshot. Never blocks concurrent calls.
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let last_failure = self.last_failure_ms.load(Ordering::Acquire);
        CircuitBreakerMetrics {
            name: self.name.clone(),
            state: self.state(),
            failure_count: self.failure_count.load(Ordering::Acquire),
            success_count: self.success_count.load(Ordering::Acquire),
            last_failure_ms: (last_failure > 0).then_some(last_failure),
            observed_at_ms: self.clock.now_millis(),
        }
    }
}
