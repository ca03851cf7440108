//! Response shaping.
//!
//! # Responsibilities
//! - Render `ServiceError` as the JSON error document
//! - Attach `X-Error-ID` and `X-Correlation-ID` to error responses
//! - Log each failure once, at a level matching its status
//!
//! # Design Decisions
//! - `IntoResponse` renders without the request path and stashes the error
//!   in the response extensions; the correlation middleware re-renders it
//!   with the path and the request's correlation id

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::ServiceError;

pub const X_ERROR_ID: &str = "x-error-id";
pub const X_CORRELATION_ID: &str = "x-correlation-id";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody<'a> {
    pub error: &'a str,
    pub status: u16,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<&'a str>,
    pub error_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<&'a str>,
}

/// Build the error response for `err`, optionally naming the request path.
pub fn render(err: &ServiceError, path: Option<&str>) -> Response {
    let error_id = uuid::Uuid::new_v4().to_string();
    let status = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let body = ErrorBody {
        error: err.message(),
        status: status.as_u16(),
        timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        path,
        error_id: error_id.clone(),
        correlation_id: err.correlation_id(),
    };

    let mut response = (status, Json(body)).into_response();
    let headers = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&error_id) {
        headers.insert(X_ERROR_ID, v);
    }
    let correlation = err.correlation_id().unwrap_or("none");
    if let Ok(v) = HeaderValue::from_str(correlation) {
        headers.insert(X_CORRELATION_ID, v);
    }
    response
}

/// Log a failed request. Server errors at `error`, client errors at `warn`.
pub fn log_failure(err: &ServiceError, error_id: &str, method: &str, path: &str) {
    let correlation_id = err.correlation_id().unwrap_or("none");
    if err.status() >= 500 {
        tracing::error!(
            error_id = %error_id,
            correlation_id = %correlation_id,
            kind = %err.kind(),
            method = %method,
            path = %path,
            status = err.status(),
            "Service error: {}",
            err.message()
        );
    } else {
        tracing::warn!(
            error_id = %error_id,
            correlation_id = %correlation_id,
            method = %method,
            path = %path,
            status = err.status(),
            "Client error: {}",
            err.message()
        );
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let mut response = render(&self, None);
        response.extensions_mut().insert(self);
        response
    }
}
