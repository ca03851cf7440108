//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files, and
//! every section falls back to its defaults when omitted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::resilience::CircuitBreakerConfig;

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener and request handling.
    pub server: ServerConfig,

    /// Blocking worker pool.
    pub worker: WorkerConfig,

    /// Log output.
    pub logging: LoggingConfig,

    /// Prometheus exporter.
    pub metrics: MetricsConfig,

    /// Simulated latency of the data services.
    pub service: ServiceConfig,

    /// Analytics report generation.
    pub analytics: AnalyticsConfig,

    /// In-process message bus.
    pub bus: BusConfig,

    /// Request body validation limits.
    pub validation: ValidationConfig,

    /// Per-name circuit breaker overrides. Names outside the standard set
    /// register additional breakers.
    pub circuit_breakers: HashMap<String, CircuitBreakerConfig>,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Whole-request timeout in milliseconds.
    pub request_timeout_ms: u64,

    /// Path prefix for the data API.
    pub api_prefix: String,

    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_ms: 30_000,
            api_prefix: "/api".to_string(),
            enable_cors: true,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Blocking worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Maximum blocking operations running at once.
    pub pool_size: usize,

    /// Operations running longer than this are logged as warnings.
    pub max_execute_time_ms: u64,

    /// Signal interruption to work whose caller stopped waiting.
    pub interrupt_orphans: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pool_size: 10,
            max_execute_time_ms: 60_000,
            interrupt_orphans: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub level: String,

    pub format: LogFormat,

    /// Emit one line per completed HTTP request.
    pub enable_request_logging: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            enable_request_logging: true,
        }
    }
}

/// Metrics exporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,

    /// Scrape endpoint bind address.
    pub bind_address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// A simulated latency: `base_ms` plus a random amount below `variance_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct DelayConfig {
    pub base_ms: u64,
    pub variance_ms: u64,
}

impl DelayConfig {
    pub const fn new(base_ms: u64, variance_ms: u64) -> Self {
        Self { base_ms, variance_ms }
    }
}

/// Simulated data service latency.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listing all records.
    pub list: DelayConfig,

    /// Fetching one record.
    pub fetch: DelayConfig,

    pub create_user: DelayConfig,

    pub create_product: DelayConfig,

    pub update: DelayConfig,

    pub delete: DelayConfig,

    /// Range for generated record ids.
    pub min_id: u32,
    pub max_id: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            list: DelayConfig::new(100, 200),
            fetch: DelayConfig::new(50, 100),
            create_user: DelayConfig::new(200, 300),
            create_product: DelayConfig::new(300, 400),
            update: DelayConfig::new(150, 200),
            delete: DelayConfig::new(100, 150),
            min_id: 1000,
            max_id: 9999,
        }
    }
}

/// Analytics report configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Bus address of the report consumer.
    pub event_address: String,

    pub database_query_delay_ms: u64,

    pub file_processing_delay_ms: u64,

    pub min_products: u32,
    pub max_products: u32,

    pub max_revenue: f64,

    pub min_order_value: f64,
    pub max_order_value: f64,

    /// Reports requested longer ago than this are refused.
    pub request_expiration_ms: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            event_address: "app.worker.analytics-report".to_string(),
            database_query_delay_ms: 2_000,
            file_processing_delay_ms: 1_000,
            min_products: 100,
            max_products: 1_000,
            max_revenue: 100_000.0,
            min_order_value: 50.0,
            max_order_value: 500.0,
            request_expiration_ms: 3_600_000,
        }
    }
}

/// Message bus configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BusConfig {
    /// How long a request waits for its reply.
    pub send_timeout_ms: u64,

    /// Queued messages per consumer before senders wait.
    pub channel_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: 5_000,
            channel_capacity: 256,
        }
    }
}

impl BusConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

/// Request validation limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub max_name_length: usize,

    /// Records reported as processed by a batch operation.
    pub batch_processed_records: u32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_name_length: 100,
            batch_processed_records: 1_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_yields_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
        assert_eq!(config.worker.pool_size, 10);
        assert_eq!(config.service.fetch, DelayConfig::new(50, 100));
        assert_eq!(config.analytics.event_address, "app.worker.analytics-report");
        assert!(config.circuit_breakers.is_empty());
    }

    #[test]
    fn test_partial_sections() {
        let config: AppConfig = toml::from_str(
            r#"
            [server]
            api_prefix = "/v2"

            [logging]
            format = "json"

            [service.fetch]
            base_ms = 0
            variance_ms = 1

            [circuit_breakers.database]
            failure_threshold = 2
            timeout_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.server.api_prefix, "/v2");
        assert_eq!(config.server.request_timeout_ms, 30_000);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.service.fetch.variance_ms, 1);
        let db = config.circuit_breakers["database"];
        assert_eq!(db.failure_threshold, 2);
        assert_eq!(db.timeout_ms, 250);
        assert_eq!(db.success_threshold, 3);
    }
}
