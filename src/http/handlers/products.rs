use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::bus::consumers::batch;
use crate::bus::Body;
use crate::context::CorrelationContext;
use crate::error::ServiceError;
use crate::http::handlers::JsonBody;
use crate::http::request::RequestContext;
use crate::http::server::AppState;
use crate::resilience::CircuitBreaker;
use crate::services::product::ProductList;
use crate::services::{NewProduct, Product, StockUpdate};

pub async fn list(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
) -> Result<Json<ProductList>, ServiceError> {
    state.products.list(&ctx).await.map(Json)
}

pub async fn get(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(id): Path<String>,
) -> Result<Json<Product>, ServiceError> {
    state.products.get(&id, &ctx).await.map(Json)
}

pub async fn create(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    JsonBody(input): JsonBody<NewProduct>,
) -> Result<(StatusCode, Json<Value>), ServiceError> {
    let product = state.products.create(input, &ctx).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Product created successfully", "product": product })),
    ))
}

pub async fn update_stock(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(id): Path<String>,
    JsonBody(update): JsonBody<StockUpdate>,
) -> Result<Json<Value>, ServiceError> {
    let product = state.products.update_stock(&id, update, &ctx).await?;
    Ok(Json(json!({ "message": "Product stock updated successfully", "product": product })))
}

/// Ask the analytics worker for a report over the bus.
pub async fn analytics_report(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
) -> Result<Json<Value>, ServiceError> {
    let ctx = ctx.derive_child("analytics-report");
    ctx.log_event(
        "analytics_request_received",
        json!({ "endpoint": "/products/analytics/report" }),
    );

    let mut body = Body::new();
    body.insert("reportType".into(), json!("analytics"));
    body.insert("timestamp".into(), json!(chrono::Utc::now().timestamp_millis()));

    let address = state.config.analytics.event_address.clone();
    let breaker = state.breakers.analytics();
    bus_round_trip(&state, &breaker, &address, &ctx, body, "analytics").await
}

/// Run a batch operation on the batch worker over the bus.
pub async fn batch_operation(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(operation): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ServiceError> {
    let ctx = ctx.derive_child("batch-operation");
    ctx.log_event(
        "batch_operation_request_received",
        json!({ "operation": operation }),
    );

    let mut body = Body::new();
    body.insert("operation".into(), json!(operation));
    body.insert("timestamp".into(), json!(chrono::Utc::now().timestamp_millis()));
    if operation.eq_ignore_ascii_case("delete") {
        let confirmed = params
            .get("confirmDelete")
            .or_else(|| params.get("confirm"))
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        body.insert("confirmDelete".into(), json!(confirmed));
    }

    let breaker = state.breakers.file_io();
    bus_round_trip(&state, &breaker, batch::ADDRESS, &ctx, body, "batch_operation").await
}

async fn bus_round_trip(
    state: &AppState,
    breaker: &CircuitBreaker,
    address: &str,
    ctx: &CorrelationContext,
    body: Body,
    event: &str,
) -> Result<Json<Value>, ServiceError> {
    let result = breaker
        .execute(|| async move {
            state
                .bus
                .request_with_context(address, ctx, body)
                .await
                .map_err(ServiceError::from)
        })
        .await;

    match result {
        Ok(reply) => {
            ctx.log_event(
                &format!("{}_response_success", event),
                json!({ "duration_ms": ctx.elapsed_ms(), "correlation_id": ctx.correlation_id() }),
            );
            Ok(Json(reply))
        }
        Err(err) => {
            ctx.log_event(
                &format!("{}_response_error", event),
                json!({
                    "error": err.message(),
                    "status_code": err.status(),
                    "correlation_id": ctx.correlation_id(),
                }),
            );
            Err(err.with_correlation_id(ctx.correlation_id()))
        }
    }
}
