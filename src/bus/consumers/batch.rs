//! Batch data operations.

use chrono::{SecondsFormat, Utc};
use rand::Rng;
use serde_json::{json, Value};

use crate::bus::{Body, EventBus};
use crate::config::ValidationConfig;
use crate::context::{extract_context, WithCorrelation};
use crate::error::ServiceError;

pub const ADDRESS: &str = "app.worker.batch-operation";

/// Supported batch operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOperation {
    Insert,
    Update,
    Delete,
    Migrate,
}

impl BatchOperation {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "insert" => Some(Self::Insert),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            "migrate" => Some(Self::Migrate),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Migrate => "migrate",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchOperationConsumer {
    config: ValidationConfig,
}

impl BatchOperationConsumer {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn register(self, bus: &EventBus) {
        bus.register(ADDRESS, move |body| {
            let this = self.clone();
            async move { this.handle(body).await }
        });
    }

    pub async fn handle(&self, body: Body) -> Result<Value, ServiceError> {
        let ctx = extract_context(&body);
        async {
            let operation = validate(&body)?;
            tracing::info!(operation = operation.as_str(), "Starting batch operation");

            let records_processed = rand::thread_rng().gen_range(0..100) + self.config.batch_processed_records;

            tracing::info!(operation = operation.as_str(), records_processed, "Batch operation completed");
            Ok(json!({
                "operation": operation.as_str(),
                "processedAt": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                "recordsProcessed": records_processed,
                "correlationId": ctx.correlation_id(),
                "status": "completed",
            }))
        }
        .with_correlation(&ctx)
        .await
    }
}

fn validate(body: &Body) -> Result<BatchOperation, ServiceError> {
    let raw = body
        .get("operation")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ServiceError::bad_request("Operation type is required for batch processing"))?;

    let operation = BatchOperation::parse(raw).ok_or_else(|| {
        ServiceError::bad_request(format!(
            "Unsupported batch operation: {}. Allowed operations: insert, update, delete, migrate",
            raw
        ))
    })?;

    if operation == BatchOperation::Delete && body.get("confirmDelete").and_then(Value::as_bool) != Some(true) {
        return Err(ServiceError::bad_request("Delete operation requires explicit confirmation"));
    }
    Ok(operation)
}
