//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds ≥ 1, timeouts > 0, pool size ≥ 1)
//! - Validate addresses and the API prefix
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::AppConfig;
use crate::resilience::CircuitBreakerConfig;

/// One rejected setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `worker.pool_size`.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "server.bind_address", &config.server.bind_address);
    if config.server.request_timeout_ms == 0 {
        errors.push(ValidationError::new("server.request_timeout_ms", "must be greater than 0"));
    }
    if !config.server.api_prefix.starts_with('/') {
        errors.push(ValidationError::new("server.api_prefix", "must start with '/'"));
    }

    if config.worker.pool_size == 0 {
        errors.push(ValidationError::new("worker.pool_size", "must be at least 1"));
    }
    if config.worker.max_execute_time_ms == 0 {
        errors.push(ValidationError::new("worker.max_execute_time_ms", "must be greater than 0"));
    }

    if config.metrics.enabled {
        check_addr(&mut errors, "metrics.bind_address", &config.metrics.bind_address);
    }

    if config.service.min_id >= config.service.max_id {
        errors.push(ValidationError::new("service.min_id", "must be less than service.max_id"));
    }

    let analytics = &config.analytics;
    if analytics.event_address.trim().is_empty() {
        errors.push(ValidationError::new("analytics.event_address", "must not be empty"));
    }
    if analytics.min_products > analytics.max_products {
        errors.push(ValidationError::new("analytics.min_products", "must not exceed analytics.max_products"));
    }
    if analytics.min_order_value > analytics.max_order_value {
        errors.push(ValidationError::new(
            "analytics.min_order_value",
            "must not exceed analytics.max_order_value",
        ));
    }

    if config.bus.send_timeout_ms == 0 {
        errors.push(ValidationError::new("bus.send_timeout_ms", "must be greater than 0"));
    }
    if config.bus.channel_capacity == 0 {
        errors.push(ValidationError::new("bus.channel_capacity", "must be at least 1"));
    }

    if config.validation.max_name_length == 0 {
        errors.push(ValidationError::new("validation.max_name_length", "must be at least 1"));
    }

    let mut names: Vec<_> = config.circuit_breakers.keys().collect();
    names.sort();
    for name in names {
        check_breaker(&mut errors, name, &config.circuit_breakers[name]);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(field, format!("'{}' is not a valid socket address", value)));
    }
}

fn check_breaker(errors: &mut Vec<ValidationError>, name: &str, cb: &CircuitBreakerConfig) {
    let field = |f: &str| format!("circuit_breakers.{}.{}", name, f);
    if name.trim().is_empty() {
        errors.push(ValidationError::new("circuit_breakers", "breaker names must not be empty"));
    }
    if cb.failure_threshold == 0 {
        errors.push(ValidationError::new(field("failure_threshold"), "must be at least 1"));
    }
    if cb.success_threshold == 0 {
        errors.push(ValidationError::new(field("success_threshold"), "must be at least 1"));
    }
    if cb.timeout_ms == 0 {
        errors.push(ValidationError::new(field("timeout_ms"), "must be greater than 0"));
    }
    if cb.reset_timeout_ms == 0 {
        errors.push(ValidationError::new(field("reset_timeout_ms"), "must be greater than 0"));
    }
}
