//! Analytics report generation.
//!
//! The request arrives with the caller's correlation context in its
//! envelope; the report is produced on the worker pool with that context
//! attached, so worker-side log lines carry the HTTP request's ids.

use chrono::{SecondsFormat, Utc};
use rand::Rng;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::bus::{Body, EventBus};
use crate::config::AnalyticsConfig;
use crate::context::{extract_context, CorrelationContext, WithCorrelation};
use crate::error::ServiceError;
use crate::execution::{BlockingExecutionBridge, Interrupt, Interrupted};

pub const REPORT_TYPE: &str = "analytics";

#[derive(Debug, Clone)]
pub struct AnalyticsConsumer {
    bridge: BlockingExecutionBridge,
    config: AnalyticsConfig,
}

impl AnalyticsConsumer {
    pub fn new(bridge: BlockingExecutionBridge, config: AnalyticsConfig) -> Self {
        Self { bridge, config }
    }

    pub fn register(self, bus: &EventBus) {
        let address = self.config.event_address.clone();
        let this = Arc::new(self);
        bus.register(&address, move |body| {
            let this = this.clone();
            async move { this.handle(body).await }
        });
    }

    pub async fn handle(&self, body: Body) -> Result<Value, ServiceError> {
        let ctx = extract_context(&body);
        self.generate(&body, &ctx).with_correlation(&ctx).await
    }

    async fn generate(&self, body: &Body, ctx: &CorrelationContext) -> Result<Value, ServiceError> {
        ctx.log_event("analytics_report_start", json!({ "operation": "analytics-report" }));

        self.validate(body)?;

        let config = self.config.clone();
        let worker_ctx = ctx.clone();
        let result = self
            .bridge
            .execute_blocking(
                move |interrupt| generate_report(&config, &worker_ctx, interrupt),
                ctx,
                |Interrupted| ServiceError::interrupted("Report generation was interrupted"),
            )
            .await;

        match &result {
            Ok(_) => ctx.log_event(
                "analytics_report_completed",
                json!({ "duration_ms": ctx.elapsed_ms() }),
            ),
            Err(e) => ctx.log_event(
                "analytics_report_failed",
                json!({ "error": e.message(), "status": e.status() }),
            ),
        }
        result
    }

    fn validate(&self, body: &Body) -> Result<(), ServiceError> {
        if body.get("reportType").and_then(Value::as_str) != Some(REPORT_TYPE) {
            return Err(ServiceError::bad_request("Invalid report type. Expected 'analytics'"));
        }

        let timestamp = body
            .get("timestamp")
            .and_then(Value::as_i64)
            .filter(|ts| *ts > 0)
            .ok_or_else(|| ServiceError::bad_request("Valid timestamp is required"))?;

        let age_ms = Utc::now().timestamp_millis() - timestamp;
        if age_ms > self.config.request_expiration_ms as i64 {
            return Err(ServiceError::gone("Request has expired. Please generate a new request"));
        }
        Ok(())
    }
}

fn generate_report(
    config: &AnalyticsConfig,
    ctx: &CorrelationContext,
    interrupt: &Interrupt,
) -> Result<Value, Interrupted> {
    tracing::info!("Generating analytics report");

    interrupt.sleep(Duration::from_millis(config.database_query_delay_ms))?;
    tracing::debug!("Database queries completed");

    interrupt.sleep(Duration::from_millis(config.file_processing_delay_ms))?;
    tracing::debug!("File processing completed");

    let mut rng = rand::thread_rng();
    let total_products = rng.gen_range(config.min_products..=config.max_products);
    let total_revenue = rng.gen::<f64>() * config.max_revenue;
    let average_order_value = rng.gen_range(config.min_order_value..=config.max_order_value);

    Ok(json!({
        "correlationId": ctx.correlation_id(),
        "requestId": ctx.request_id(),
        "reportType": REPORT_TYPE,
        "generatedAt": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "processingTimeMs": ctx.elapsed_ms(),
        "totalProducts": total_products,
        "totalRevenue": total_revenue,
        "topCategory": "Electronics",
        "averageOrderValue": average_order_value,
        "userId": ctx.user_id(),
        "tenantId": ctx.tenant_id(),
        "status": "completed",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;
    use crate::context::enrich_message;
    use crate::error::ErrorKind;
    use crate::execution::WorkerPool;

    fn consumer() -> AnalyticsConsumer {
        AnalyticsConsumer::new(
            BlockingExecutionBridge::new(WorkerPool::new(&WorkerConfig::default())),
            AnalyticsConfig {
                database_query_delay_ms: 5,
                file_processing_delay_ms: 5,
                ..AnalyticsConfig::default()
            },
        )
    }

    fn request(ctx: &CorrelationContext, timestamp: i64) -> Body {
        let mut body = Body::new();
        body.insert("reportType".into(), json!("analytics"));
        body.insert("timestamp".into(), json!(timestamp));
        enrich_message(ctx, &body)
    }

    #[tokio::test]
    async fn test_report_carries_request_context() {
        let ctx = CorrelationContext::create()
            .with_user_id("u-1")
            .with_tenant_id("acme")
            .derive_child("analytics-report");

        let report = consumer()
            .handle(request(&ctx, Utc::now().timestamp_millis()))
            .await
            .unwrap();

        assert_eq!(report["correlationId"], json!(ctx.correlation_id()));
        assert_eq!(report["requestId"], json!(ctx.request_id()));
        assert_eq!(report["tenantId"], json!("acme"));
        assert_eq!(report["userId"], json!("u-1"));
        let products = report["totalProducts"].as_u64().unwrap();
        assert!((100..=1000).contains(&products));
    }

    #[tokio::test]
    async fn test_rejects_bad_requests() {
        let ctx = CorrelationContext::create();
        let consumer = consumer();

        let expired = consumer.handle(request(&ctx, 1)).await.unwrap_err();
        assert_eq!(expired.kind(), ErrorKind::Gone);
        assert_eq!(expired.status(), 410);

        let missing = consumer.handle(request(&ctx, 0)).await.unwrap_err();
        assert_eq!(missing.status(), 400);

        let mut wrong_type = request(&ctx, Utc::now().timestamp_millis());
        wrong_type.insert("reportType".into(), json!("sales"));
        assert_eq!(consumer.handle(wrong_type).await.unwrap_err().kind(), ErrorKind::BadRequest);
    }
}
