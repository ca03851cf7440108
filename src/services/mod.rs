//! Simulated data services.
//!
//! # Responsibilities
//! - Validate inputs before touching the data layer
//! - Run each data access through a circuit breaker and the blocking bridge
//! - Simulate data-store latency from configuration
//!
//! # Data Flow
//! ```text
//! handler → service (validate) → DataAccess::run
//!     → breaker.execute(|| bridge.execute_blocking(work, ctx, classify))
//!     → worker thread: simulated delay → fixed records
//! ```

pub mod product;
pub mod user;

pub use product::{NewProduct, Product, ProductService, StockUpdate};
pub use user::{User, UserInput, UserService};

use rand::Rng;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::config::DelayConfig;
use crate::context::CorrelationContext;
use crate::error::ServiceError;
use crate::execution::{BlockingExecutionBridge, Interrupt, Interrupted};
use crate::resilience::CircuitBreaker;

/// Failures raised by simulated data work on the worker pool.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

impl DataError {
    pub fn classify(self) -> ServiceError {
        match self {
            DataError::NotFound(_) => ServiceError::not_found(self.to_string()),
            DataError::Interrupted(_) => ServiceError::interrupted("Data operation was interrupted"),
        }
    }
}

/// One resource class: a breaker plus the bridge that runs its work.
#[derive(Debug, Clone)]
pub struct DataAccess {
    breaker: Arc<CircuitBreaker>,
    bridge: BlockingExecutionBridge,
}

impl DataAccess {
    pub fn new(breaker: Arc<CircuitBreaker>, bridge: BlockingExecutionBridge) -> Self {
        Self { breaker, bridge }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Run `work` behind the breaker, on the worker pool, with `ctx` attached.
    pub async fn run<T, W>(&self, operation: &'static str, ctx: &CorrelationContext, work: W) -> Result<T, ServiceError>
    where
        W: FnOnce(&Interrupt) -> Result<T, DataError> + Send + 'static,
        T: Send + 'static,
    {
        ctx.log_event("service_operation_start", json!({ "operation": operation }));

        let result = self
            .breaker
            .execute(|| self.bridge.execute_blocking(work, ctx, DataError::classify))
            .await;

        match &result {
            Ok(_) => ctx.log_event(
                "service_operation_completed",
                json!({ "operation": operation, "duration_ms": ctx.elapsed_ms() }),
            ),
            Err(e) => ctx.log_event(
                "service_operation_failed",
                json!({ "operation": operation, "error": e.message(), "kind": e.kind().as_str() }),
            ),
        }
        result.map_err(|e| e.with_correlation_id(ctx.correlation_id()))
    }
}

/// Sleep for a simulated latency drawn from `delay`.
pub(crate) fn simulate_latency(interrupt: &Interrupt, delay: DelayConfig) -> Result<(), Interrupted> {
    let jitter = if delay.variance_ms == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..delay.variance_ms)
    };
    interrupt.sleep(Duration::from_millis(delay.base_ms + jitter))
}

/// Id for a newly created record.
pub(crate) fn generate_id(min_id: u32, max_id: u32) -> u32 {
    rand::thread_rng().gen_range(min_id..max_id.max(min_id + 1))
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Trimmed id, or a 400 naming the resource.
pub(crate) fn require_id(id: &str, resource: &str) -> Result<String, ServiceError> {
    let id = id.trim();
    if id.is_empty() {
        Err(ServiceError::bad_request(format!("{} ID must not be empty", resource)))
    } else {
        Ok(id.to_string())
    }
}

/// Non-blank string field within `max_len` characters.
pub(crate) fn require_text(
    value: Option<&str>,
    message: &str,
    field: &str,
    max_len: usize,
) -> Result<String, ServiceError> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ServiceError::bad_request(message))?;
    if value.chars().count() > max_len {
        return Err(ServiceError::bad_request(format!(
            "{} must be at most {} characters",
            field, max_len
        )));
    }
    Ok(value.to_string())
}
