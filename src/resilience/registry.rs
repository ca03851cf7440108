//! Named circuit breakers shared across request handlers.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

use crate::observability::metrics;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::clock::{Clock, SystemClock};
use crate::resilience::config::CircuitBreakerConfig;
use crate::resilience::metrics::CircuitBreakerMetrics;

pub const DATABASE: &str = "database";
pub const EXTERNAL_API: &str = "external-api";
pub const ANALYTICS: &str = "analytics";
pub const FILE_IO: &str = "file-io";

/// Owns every breaker in the process, keyed by name.
///
/// At most one breaker exists per name; racing first lookups all receive the
/// same instance.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    default_config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerRegistry {
    /// Registry with the standard breakers pre-registered.
    pub fn new() -> Self {
        Self::with_overrides(&HashMap::new())
    }

    /// Standard breakers, with per-name configuration overrides applied.
    /// Names not among the standard set are registered as well.
    pub fn with_overrides(overrides: &HashMap<String, CircuitBreakerConfig>) -> Self {
        Self::with_clock(overrides, Arc::new(SystemClock))
    }

    pub fn with_clock(overrides: &HashMap<String, CircuitBreakerConfig>, clock: Arc<dyn Clock>) -> Self {
        let registry = Self::empty(CircuitBreakerConfig::default(), clock);

        let defaults = [
            (DATABASE, CircuitBreakerConfig::default()),
            (EXTERNAL_API, CircuitBreakerConfig::fast_fail()),
            (ANALYTICS, CircuitBreakerConfig::resilient()),
            (FILE_IO, CircuitBreakerConfig::new(7, 3, 8_000, 45_000)),
        ];
        for (name, config) in defaults {
            let config = overrides.get(name).copied().unwrap_or(config);
            registry.get_or_create(name, Some(config));
        }
        for (name, config) in overrides {
            registry.get_or_create(name, Some(*config));
        }

        tracing::info!(count = registry.len(), "Initialized default circuit breakers");
        registry
    }

    /// Registry with nothing pre-registered.
    pub fn empty(default_config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            breakers: DashMap::new(),
            default_config,
            clock,
        }
    }

    /// Existing breaker for `name`, or a new one built from `config`
    /// (the registry default when `None`).
    pub fn get_or_create(&self, name: &str, config: Option<CircuitBreakerConfig>) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return existing.value().clone();
        }

        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                let config = config.unwrap_or(self.default_config);
                tracing::info!(
                    breaker = %name,
                    failure_threshold = config.failure_threshold,
                    success_threshold = config.success_threshold,
                    timeout_ms = config.timeout_ms,
                    reset_timeout_ms = config.reset_timeout_ms,
                    "Created circuit breaker"
                );
                metrics::record_breaker_registered(name);
                Arc::new(CircuitBreaker::with_clock(name, config, self.clock.clone()))
            })
            .value()
            .clone()
    }

    /// Breaker by name, created with the default policy if unknown.
    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        if !self.breakers.contains_key(name) {
            tracing::warn!(breaker = %name, "Circuit breaker not found, creating with default config");
        }
        self.get_or_create(name, None)
    }

    pub fn database(&self) -> Arc<CircuitBreaker> {
        self.get(DATABASE)
    }

    pub fn external_api(&self) -> Arc<CircuitBreaker> {
        self.get(EXTERNAL_API)
    }

    pub fn analytics(&self) -> Arc<CircuitBreaker> {
        self.get(ANALYTICS)
    }

    pub fn file_io(&self) -> Arc<CircuitBreaker> {
        self.get(FILE_IO)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.breakers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Snapshot for one breaker; `None` if the name is unknown.
    pub fn metrics_snapshot(&self, name: &str) -> Option<CircuitBreakerMetrics> {
        self.breakers.get(name).map(|cb| cb.metrics())
    }

    /// Snapshots of every breaker, ordered by name.
    pub fn list_all(&self) -> Vec<CircuitBreakerMetrics> {
        let mut all: Vec<_> = self.breakers.iter().map(|cb| cb.metrics()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.breakers.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::metrics::testing::TestRecorder;
    use crate::resilience::circuit_breaker::CircuitState;

    #[test]
    fn test_defaults_registered() {
        let registry = CircuitBreakerRegistry::new();
        assert_eq!(registry.names(), vec!["analytics", "database", "external-api", "file-io"]);
        assert_eq!(registry.external_api().config().failure_threshold, 3);
        assert_eq!(registry.file_io().config().reset_timeout_ms, 45_000);
    }

    #[test]
    fn test_overrides_apply() {
        let mut overrides = HashMap::new();
        overrides.insert(DATABASE.to_string(), CircuitBreakerConfig::new(2, 1, 100, 200));
        overrides.insert("payments".to_string(), CircuitBreakerConfig::fast_fail());
        let registry = CircuitBreakerRegistry::with_overrides(&overrides);

        assert_eq!(registry.database().config().failure_threshold, 2);
        assert!(registry.contains("payments"));
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn test_unknown_name_created_once() {
        let registry = CircuitBreakerRegistry::new();
        assert!(registry.metrics_snapshot("search").is_none());

        let a = registry.get("search");
        let b = registry.get_or_create("search", Some(CircuitBreakerConfig::fast_fail()));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.config().failure_threshold, 5);
    }

    #[test]
    fn test_concurrent_first_access_yields_one_instance() {
        let registry = Arc::new(CircuitBreakerRegistry::new());
        let barrier = Arc::new(std::sync::Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    registry.get("contended")
                })
            })
            .collect();

        let breakers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(breakers.iter().all(|b| Arc::ptr_eq(b, &breakers[0])));
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn test_new_breakers_publish_closed_state() {
        let recorder = TestRecorder::default();
        let _guard = ::metrics::set_default_local_recorder(&recorder);

        let registry = CircuitBreakerRegistry::new();
        registry.get("search");

        for name in ["analytics", "database", "external-api", "file-io", "search"] {
            assert_eq!(recorder.gauge(&format!("breaker_state{{breaker={}}}", name)), Some(0.0));
        }
    }

    #[test]
    fn test_list_all_sorted_snapshot() {
        let registry = CircuitBreakerRegistry::new();
        let all = registry.list_all();
        let names: Vec<_> = all.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["analytics", "database", "external-api", "file-io"]);
        assert!(all.iter().all(|m| m.state == CircuitState::Closed));
    }
}
