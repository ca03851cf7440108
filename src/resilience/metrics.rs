//! Read-only breaker snapshots for diagnostics.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::resilience::circuit_breaker::CircuitState;

/// A point-in-time view of one breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerMetrics {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    /// Epoch millis of the last failure.
    pub last_failure_ms: Option<u64>,
    /// Epoch millis at which the snapshot was taken.
    #[serde(skip)]
    pub observed_at_ms: u64,
}

impl CircuitBreakerMetrics {
    pub fn is_open(&self) -> bool {
        self.state == CircuitState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.state == CircuitState::Closed
    }

    pub fn is_half_open(&self) -> bool {
        self.state == CircuitState::HalfOpen
    }

    /// RFC 3339 timestamp of the last failure, or "Never".
    pub fn last_failure_formatted(&self) -> String {
        self.last_failure_ms
            .and_then(|ms| DateTime::<Utc>::from_timestamp_millis(ms as i64))
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_else(|| "Never".to_string())
    }

    pub fn time_since_last_failure_ms(&self) -> Option<u64> {
        self.last_failure_ms
            .map(|ms| self.observed_at_ms.saturating_sub(ms))
    }

    /// Human-readable age of the last failure, e.g. "4m 12s ago".
    pub fn time_since_last_failure(&self) -> String {
        match self.time_since_last_failure_ms() {
            None => "Never".to_string(),
            Some(ms) => format!("{} ago", humanize_millis(ms)),
        }
    }
}

fn humanize_millis(ms: u64) -> String {
    let secs = ms / 1000;
    if secs == 0 {
        return format!("{}ms", ms);
    }
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    match (h, m) {
        (0, 0) => format!("{}s", s),
        (0, _) => format!("{}m {}s", m, s),
        _ => format!("{}h {}m", h, m),
    }
}

/// Diagnostics row as exposed by the health endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerStatus {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_time: String,
    pub time_since_last_failure: String,
}

impl From<&CircuitBreakerMetrics> for CircuitBreakerStatus {
    fn from(m: &CircuitBreakerMetrics) -> Self {
        Self {
            name: m.name.clone(),
            state: m.state,
            failure_count: m.failure_count,
            success_count: m.success_count,
            last_failure_time: m.last_failure_formatted(),
            time_since_last_failure: m.time_since_last_failure(),
        }
    }
}
