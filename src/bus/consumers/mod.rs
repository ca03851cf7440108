//! Bus consumers hosted by this process.
//!
//! | Address | Consumer |
//! |---|---|
//! | `app.worker.analytics-report` (configurable) | [`analytics::AnalyticsConsumer`] |
//! | `app.worker.batch-operation` | [`batch::BatchOperationConsumer`] |
//! | `app.worker.operation` | legacy acknowledgement |
//! | `app.health.check` | [`health::check`] |

pub mod analytics;
pub mod batch;
pub mod health;

use serde_json::Value;

use crate::bus::EventBus;
use crate::config::AppConfig;
use crate::error::ServiceError;
use crate::execution::BlockingExecutionBridge;

pub const LEGACY_OPERATION: &str = "app.worker.operation";

/// Register every consumer on `bus`.
pub fn register_all(bus: &EventBus, bridge: &BlockingExecutionBridge, config: &AppConfig) {
    analytics::AnalyticsConsumer::new(bridge.clone(), config.analytics.clone()).register(bus);
    batch::BatchOperationConsumer::new(config.validation.clone()).register(bus);
    health::register(bus, bridge.pool().clone());

    bus.register(LEGACY_OPERATION, |_| async {
        tracing::info!("Processing legacy operation");
        Ok::<_, ServiceError>(Value::from("Operation completed"))
    });

    tracing::info!(addresses = ?bus.addresses(), "Bus consumers registered");
}
