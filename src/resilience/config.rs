//! Circuit breaker tuning.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Thresholds and timeouts for a single circuit breaker.
///
/// Immutable once handed to a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in Closed before the circuit opens.
    pub failure_threshold: u32,

    /// Successes in Half-Open before the circuit closes.
    pub success_threshold: u32,

    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,

    /// Time in Open before a trial call is admitted, in milliseconds.
    pub reset_timeout_ms: u64,

    /// Admit a single in-flight trial while Half-Open instead of every caller.
    pub single_trial: bool,
}

impl CircuitBreakerConfig {
    pub fn new(failure_threshold: u32, success_threshold: u32, timeout_ms: u64, reset_timeout_ms: u64) -> Self {
        Self {
            failure_threshold,
            success_threshold,
            timeout_ms,
            reset_timeout_ms,
            single_trial: false,
        }
    }

    /// Tighter thresholds for dependencies that should be abandoned quickly.
    pub fn fast_fail() -> Self {
        Self::new(3, 2, 5_000, 30_000)
    }

    /// Tolerant thresholds for slow but usually healthy dependencies.
    pub fn resilient() -> Self {
        Self::new(10, 5, 15_000, 120_000)
    }

    /// Gate Half-Open to one in-flight trial.
    pub fn with_single_trial(mut self, single_trial: bool) -> Self {
        self.single_trial = single_trial;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::new(5, 3, 10_000, 60_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let default = CircuitBreakerConfig::default();
        assert_eq!(default.failure_threshold, 5);
        assert_eq!(default.timeout(), Duration::from_secs(10));

        let fast = CircuitBreakerConfig::fast_fail();
        assert!(fast.failure_threshold < default.failure_threshold);
        assert!(fast.reset_timeout() < default.reset_timeout());

        let resilient = CircuitBreakerConfig::resilient();
        assert!(resilient.failure_threshold > default.failure_threshold);
        assert!(!resilient.single_trial);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: CircuitBreakerConfig = toml::from_str("failure_threshold = 2").unwrap();
        assert_eq!(config.failure_threshold, 2);
        assert_eq!(config.success_threshold, 3);
        assert_eq!(config.reset_timeout_ms, 60_000);
    }
}
