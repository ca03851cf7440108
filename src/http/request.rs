//! Request ingress: correlation context and request logging.
//!
//! # Responsibilities
//! - Build a `CorrelationContext` from request metadata
//! - Make it available to handlers (`RequestContext` extractor)
//! - Keep it attached to the logging context while the handler runs
//! - Echo `X-Correlation-ID` / `X-Request-ID` on every response
//! - Log and count completed requests
//!
//! # Design Decisions
//! - Inbound `X-Request-ID` is set by `SetRequestIdLayer` before this
//!   middleware runs, so the context always adopts the same id the response
//!   carries

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Instant;

use crate::context::{keys, CorrelationContext, WithCorrelation};
use crate::error::ServiceError;
use crate::http::response::{self, X_CORRELATION_ID, X_ERROR_ID};
use crate::http::server::AppState;
use crate::observability::metrics;

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_TENANT_ID: &str = "x-tenant-id";
pub const X_USER_ID: &str = "x-user-id";
pub const X_TRACE_ID: &str = "x-trace-id";
pub const X_SESSION_ID: &str = "x-session-id";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Correlation context for a request with these headers from `remote`.
pub fn context_from_headers(headers: &HeaderMap, remote: Option<SocketAddr>) -> CorrelationContext {
    let mut ctx = CorrelationContext::create();

    if let Some(addr) = remote {
        ctx = ctx.with_source_ip(addr.ip().to_string());
    }
    if let Some(ua) = header(headers, header::USER_AGENT.as_str()) {
        ctx = ctx.with_user_agent(ua);
    }
    if let Some(id) = header(headers, X_CORRELATION_ID) {
        ctx = ctx.with_correlation_id(id);
    }
    if let Some(id) = header(headers, X_REQUEST_ID) {
        ctx = ctx.with_attribute(keys::REQUEST_ID, id);
    }
    if let Some(tenant) = header(headers, X_TENANT_ID) {
        ctx = ctx.with_tenant_id(tenant);
    }
    if let Some(user) = header(headers, X_USER_ID) {
        ctx = ctx.with_user_id(user);
    }
    if let Some(trace) = header(headers, X_TRACE_ID) {
        ctx = ctx.with_trace_id(trace);
    }
    if let Some(session) = header(headers, X_SESSION_ID) {
        ctx = ctx.with_session_id(session);
    }
    ctx
}

/// Handler extractor for the request's correlation context.
#[derive(Debug, Clone)]
pub struct RequestContext(pub CorrelationContext);

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = match parts.extensions.get::<CorrelationContext>() {
            Some(ctx) => ctx.clone(),
            None => context_from_headers(&parts.headers, None),
        };
        Ok(RequestContext(ctx))
    }
}

/// Middleware wrapping every routed request.
pub async fn correlation_middleware(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let started = Instant::now();
    let remote = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|c| c.0);
    let ctx = context_from_headers(req.headers(), remote);
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    req.extensions_mut().insert(ctx.clone());
    let mut response = next.run(req).with_correlation(&ctx).await;

    if let Some(err) = response.extensions_mut().remove::<ServiceError>() {
        let err = match err.correlation_id() {
            Some(_) => err,
            None => err.with_correlation_id(ctx.correlation_id()),
        };
        response = response::render(&err, Some(&path));
        let error_id = response
            .headers()
            .get(X_ERROR_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        response::log_failure(&err, error_id, &method, &path);
    }

    let headers = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(ctx.correlation_id()) {
        headers.insert(X_CORRELATION_ID, v);
    }
    if let Ok(v) = HeaderValue::from_str(ctx.request_id()) {
        headers.insert(X_REQUEST_ID, v);
    }

    let status = response.status().as_u16();
    let elapsed = started.elapsed();
    metrics::record_request(&method, status, elapsed);
    if state.config.logging.enable_request_logging {
        let _guard = ctx.attach_logging_context();
        tracing::info!(
            method = %method,
            path = %path,
            status,
            duration_ms = elapsed.as_millis() as u64,
            "Request completed"
        );
    }
    response
}
