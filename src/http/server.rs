//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build shared application state (breakers, worker pool, bus, services)
//! - Create the Axum router with every route under the API prefix
//! - Wire up middleware (CORS, tracing, request id, correlation, timeout)
//! - Serve on a listener until the shutdown future resolves

use axum::{
    error_handling::HandleErrorLayer,
    http::{header, HeaderName, Method},
    middleware,
    routing::{get, post, put},
    BoxError, Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower::{timeout::error::Elapsed, timeout::TimeoutLayer, ServiceBuilder};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::bus::{consumers, EventBus};
use crate::config::AppConfig;
use crate::error::ServiceError;
use crate::execution::{BlockingExecutionBridge, WorkerPool};
use crate::http::handlers::{health, products, users};
use crate::http::request::{correlation_middleware, X_REQUEST_ID, X_TENANT_ID, X_USER_ID};
use crate::http::response::{X_CORRELATION_ID, X_ERROR_ID};
use crate::resilience::CircuitBreakerRegistry;
use crate::services::{DataAccess, ProductService, UserService};

/// Application state injected into handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub breakers: Arc<CircuitBreakerRegistry>,
    pub bridge: BlockingExecutionBridge,
    pub bus: EventBus,
    pub users: UserService,
    pub products: ProductService,
    pub started_at: Instant,
}

impl AppState {
    /// Build every subsystem from `config` and register the bus consumers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: AppConfig) -> Self {
        let breakers = Arc::new(CircuitBreakerRegistry::with_overrides(&config.circuit_breakers));
        let bridge = BlockingExecutionBridge::new(WorkerPool::new(&config.worker));
        let bus = EventBus::new(&config.bus);
        consumers::register_all(&bus, &bridge, &config);

        let data = DataAccess::new(breakers.database(), bridge.clone());
        let users = UserService::new(data.clone(), config.service.clone(), config.validation.clone());
        let products = ProductService::new(data, config.service.clone(), config.validation.clone());

        Self {
            config: Arc::new(config),
            breakers,
            bridge,
            bus,
            users,
            products,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    /// Stop accepting blocking work and close the bus.
    pub fn shutdown(&self) {
        self.bridge.pool().shutdown();
        self.bus.close();
        tracing::info!("Worker pool and bus closed");
    }
}

/// HTTP server for the API.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given state.
    pub fn new(state: AppState) -> Self {
        let router = Self::build_router(&state);
        Self { router, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: &AppState) -> Router {
        let config = &state.config;

        let api = Router::new()
            .route("/common", get(common))
            .route("/users", get(users::list).post(users::create))
            .route("/users/{id}", get(users::get).put(users::update).delete(users::delete))
            .route("/products", get(products::list).post(products::create))
            .route("/products/analytics/report", get(products::analytics_report))
            .route("/products/batch/{operation}", post(products::batch_operation))
            .route("/products/{id}", get(products::get))
            .route("/products/{id}/stock", put(products::update_stock));

        let health = Router::new()
            .route("/health", get(health::health))
            .route("/health/liveness", get(health::liveness))
            .route("/health/readiness", get(health::readiness))
            .route("/health/detailed", get(health::detailed))
            .route("/health/circuit-breakers", get(health::circuit_breakers));

        let prefix = config.server.api_prefix.trim_end_matches('/');
        let router = if prefix.is_empty() {
            Router::new().merge(api)
        } else {
            Router::new().nest(prefix, api)
        };

        let timeout_ms = config.server.request_timeout_ms;
        let router = router
            .merge(health)
            .with_state(state.clone())
            .layer(
                ServiceBuilder::new()
                    .layer(HandleErrorLayer::new(move |err: BoxError| async move {
                        timeout_error(err, timeout_ms)
                    }))
                    .layer(TimeoutLayer::new(config.server.request_timeout())),
            )
            .layer(middleware::from_fn_with_state(state.clone(), correlation_middleware))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http());

        if config.server.enable_cors {
            router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
                    .allow_headers([
                        header::CONTENT_TYPE,
                        header::AUTHORIZATION,
                        HeaderName::from_static(X_CORRELATION_ID),
                        HeaderName::from_static(X_REQUEST_ID),
                        HeaderName::from_static(X_TENANT_ID),
                        HeaderName::from_static(X_USER_ID),
                    ])
                    .expose_headers([
                        HeaderName::from_static(X_CORRELATION_ID),
                        HeaderName::from_static(X_REQUEST_ID),
                        HeaderName::from_static(X_ERROR_ID),
                    ]),
            )
        } else {
            router
        }
    }

    /// Run the server on `listener` until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            api_prefix = %self.state.config.server.api_prefix,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        self.state.shutdown();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn timeout_error(err: BoxError, timeout_ms: u64) -> ServiceError {
    if err.is::<Elapsed>() {
        ServiceError::request_timeout(timeout_ms)
    } else {
        ServiceError::internal(format!("Unhandled middleware error: {}", err))
    }
}

/// Public endpoint, no authentication required.
async fn common() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "message": "This is a public endpoint, no authentication required.",
        "status": "success",
        "timestamp": chrono::Utc::now().timestamp_millis(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn router(config: AppConfig) -> Router {
        HttpServer::new(AppState::new(config)).router
    }

    #[tokio::test]
    async fn test_routes_mounted_under_prefix() {
        let mut config = AppConfig::default();
        config.server.api_prefix = "/v2".into();
        let app = router(config);

        let res = app
            .clone()
            .oneshot(Request::get("/v2/common").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().contains_key("x-correlation-id"));
        assert!(res.headers().contains_key("x-request-id"));

        let res = app
            .oneshot(Request::get("/api/common").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_inbound_ids_are_kept() {
        let app = router(AppConfig::default());
        let res = app
            .oneshot(
                Request::get("/health")
                    .header("x-correlation-id", "corr-abc")
                    .header("x-request-id", "req-abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.headers()["x-correlation-id"], "corr-abc");
        assert_eq!(res.headers()["x-request-id"], "req-abc");
    }

    #[tokio::test]
    async fn test_request_timeout_is_json_504() {
        let mut config = AppConfig::default();
        config.server.request_timeout_ms = 30;
        config.service.fetch = crate::config::DelayConfig::new(400, 0);
        let app = router(config);

        let res = app
            .oneshot(
                Request::get("/api/users/1")
                    .header("x-correlation-id", "slow-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
        assert!(res.headers().contains_key("x-error-id"));

        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Request timed out after 30ms");
        assert_eq!(body["status"], 504);
        assert_eq!(body["path"], "/api/users/1");
        assert_eq!(body["correlationId"], "slow-1");
    }

    #[tokio::test]
    async fn test_cors_allows_context_headers() {
        let app = router(AppConfig::default());

        let res = app
            .clone()
            .oneshot(
                Request::options("/api/users")
                    .header("origin", "http://app.example.com")
                    .header("access-control-request-method", "GET")
                    .header("access-control-request-headers", "x-correlation-id,x-tenant-id")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let allowed = res.headers()["access-control-allow-headers"].to_str().unwrap().to_string();
        for name in ["x-correlation-id", "x-request-id", "x-tenant-id", "x-user-id"] {
            assert!(allowed.contains(name), "{name} missing from {allowed}");
        }

        let res = app
            .oneshot(
                Request::get("/api/common")
                    .header("origin", "http://app.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let exposed = res.headers()["access-control-expose-headers"].to_str().unwrap().to_string();
        for name in ["x-correlation-id", "x-request-id", "x-error-id"] {
            assert!(exposed.contains(name), "{name} missing from {exposed}");
        }
    }

    #[tokio::test]
    async fn test_missing_body_is_json_400_with_path() {
        let app = router(AppConfig::default());
        let res = app
            .oneshot(Request::post("/api/users").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Request body is required");
        assert_eq!(body["path"], "/api/users");
        assert!(body["correlationId"].is_string());
    }
}
