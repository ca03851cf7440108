//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Service operation:
//!     → registry.rs (look up the breaker for the resource class)
//!     → circuit_breaker.rs (admit or fail fast, enforce per-call timeout)
//!     → execution bridge (run the blocking work on the worker pool)
//!     → circuit_breaker.rs (record success/failure, maybe transition)
//! ```
//!
//! # Design Decisions
//! - One breaker per resource class, created once and shared via Arc
//! - Breaker-open and breaker-timeout are distinct error kinds
//! - Snapshots (metrics.rs) never mutate breaker state

pub mod circuit_breaker;
pub mod clock;
pub mod config;
pub mod metrics;
pub mod registry;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use config::CircuitBreakerConfig;
pub use metrics::{CircuitBreakerMetrics, CircuitBreakerStatus};
pub use registry::CircuitBreakerRegistry;
