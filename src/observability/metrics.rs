//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define service metrics (breaker outcomes, HTTP traffic, blocking work, bus)
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `breaker_calls_total` (counter): calls by breaker and outcome
//!   (success, failure, timeout, rejected)
//! - `breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `breaker_transitions_total` (counter): state changes by breaker and target
//! - `http_requests_total` (counter): requests by method and status
//! - `http_request_duration_seconds` (histogram): request latency
//! - `blocking_operations_total` (counter): bridge outcomes
//! - `bus_requests_total` (counter): bus round trips by address and outcome
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; with no exporter installed
//!   every call is a no-op
//! - The exporter is only installed when metrics are enabled in config

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus exporter with its own HTTP listener.
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_breaker_call(breaker: &str, outcome: &'static str) {
    metrics::counter!("breaker_calls_total", "breaker" => breaker.to_string(), "outcome" => outcome)
        .increment(1);
}

/// Publish the initial closed state so a new breaker shows up before its
/// first transition.
pub fn record_breaker_registered(breaker: &str) {
    metrics::gauge!("breaker_state", "breaker" => breaker.to_string()).set(CircuitState::Closed as u8 as f64);
}

pub fn record_breaker_transition(breaker: &str, to: CircuitState) {
    metrics::counter!(
        "breaker_transitions_total",
        "breaker" => breaker.to_string(),
        "to" => to.as_str()
    )
    .increment(1);
    metrics::gauge!("breaker_state", "breaker" => breaker.to_string()).set(to as u8 as f64);
}

pub fn record_request(method: &str, status: u16, elapsed: Duration) {
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("http_request_duration_seconds", "method" => method.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_blocking(outcome: &'static str) {
    metrics::counter!("blocking_operations_total", "outcome" => outcome).increment(1);
}

pub fn record_bus(address: &str, outcome: &'static str) {
    metrics::counter!("bus_requests_total", "address" => address.to_string(), "outcome" => outcome)
        .increment(1);
}
