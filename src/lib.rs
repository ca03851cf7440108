//! Resilient API service library.
//!
//! Circuit breakers, correlation-context propagation, and a blocking-work
//! bridge behind an Axum HTTP surface and an in-process message bus.

pub mod bus;
pub mod config;
pub mod context;
pub mod error;
pub mod execution;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod services;

pub use config::AppConfig;
pub use context::CorrelationContext;
pub use error::{ErrorKind, ServiceError};
pub use execution::BlockingExecutionBridge;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use resilience::{CircuitBreaker, CircuitBreakerRegistry};
