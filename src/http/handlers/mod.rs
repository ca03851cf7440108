//! Route handlers.

pub mod health;
pub mod products;
pub mod users;

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::{header, HeaderMap};
use axum::Json;
use serde::de::DeserializeOwned;

use crate::error::ServiceError;

/// JSON request body whose rejections are 400 [`ServiceError`]s.
///
/// An empty body is reported before the content type, so a bare POST reads
/// as a missing body rather than a wrong media type.
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let json_content = is_json_content(req.headers());
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ServiceError::bad_request(format!("Invalid request body: {}", e.body_text())))?;

        if bytes.is_empty() {
            return Err(ServiceError::bad_request("Request body is required"));
        }
        if !json_content {
            return Err(ServiceError::bad_request("Content-Type must be application/json"));
        }

        Json::<T>::from_bytes(&bytes)
            .map(|Json(value)| JsonBody(value))
            .map_err(|rejection| {
                ServiceError::bad_request(format!("Invalid request body: {}", rejection.body_text()))
            })
    }
}

fn is_json_content(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    essence.eq_ignore_ascii_case("application/json") || essence.ends_with("+json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde_json::Value;

    async fn extract(content_type: Option<&str>, body: &'static str) -> Result<Value, ServiceError> {
        let mut builder = Request::post("/users");
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        let req = builder.body(Body::from(body)).unwrap();
        JsonBody::<Value>::from_request(req, &()).await.map(|JsonBody(v)| v)
    }

    #[tokio::test]
    async fn test_empty_body_is_required() {
        let err = extract(None, "").await.unwrap_err();
        assert_eq!(err.message(), "Request body is required");
        let err = extract(Some("application/json"), "").await.unwrap_err();
        assert_eq!(err.message(), "Request body is required");
    }

    #[tokio::test]
    async fn test_wrong_content_type_with_body() {
        let err = extract(Some("text/plain"), r#"{"name":"Ann"}"#).await.unwrap_err();
        assert_eq!(err.status(), 400);
        assert_eq!(err.message(), "Content-Type must be application/json");

        let err = extract(None, r#"{"name":"Ann"}"#).await.unwrap_err();
        assert_eq!(err.message(), "Content-Type must be application/json");
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let err = extract(Some("application/json"), "{not json").await.unwrap_err();
        assert!(err.message().starts_with("Invalid request body:"));
    }

    #[tokio::test]
    async fn test_json_with_charset() {
        let value = extract(Some("application/json; charset=utf-8"), r#"{"name":"Ann"}"#)
            .await
            .unwrap();
        assert_eq!(value["name"], "Ann");
    }
}
