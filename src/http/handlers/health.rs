//! Health and diagnostics endpoints.
//!
//! | Path | Meaning |
//! |---|---|
//! | `/health` | process is serving |
//! | `/health/liveness` | process is alive |
//! | `/health/readiness` | bus round trip to the worker health probe succeeds |
//! | `/health/detailed` | readiness plus pool, system and configuration details |
//! | `/health/circuit-breakers` | read-only breaker listing |

use axum::{extract::State, http::StatusCode, Json};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use std::time::Instant;

use crate::bus::consumers::health as probe;
use crate::bus::Body;
use crate::http::server::AppState;
use crate::resilience::CircuitBreakerStatus;

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "UP",
        "timestamp": now(),
        "uptime": state.uptime_ms(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn liveness(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let alive = !state.bridge.pool().is_shut_down();
    let status = if alive { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        status,
        Json(json!({
            "status": if alive { "ALIVE" } else { "DEAD" },
            "timestamp": now(),
            "uptime": state.uptime_ms(),
        })),
    )
}

/// Result of the bus round trip to the worker health probe.
struct Dependencies {
    ready: bool,
    report: Value,
}

async fn check_dependencies(state: &AppState) -> Dependencies {
    let mut body = Body::new();
    body.insert("type".into(), json!("health-check"));
    body.insert("timestamp".into(), json!(Utc::now().timestamp_millis()));

    let started = Instant::now();
    match state.bus.request(probe::ADDRESS, body).await {
        Ok(reply) => {
            let worker_up = reply.get("status").and_then(Value::as_str) == Some("UP");
            Dependencies {
                ready: worker_up,
                report: json!({
                    "eventBus": {
                        "status": "UP",
                        "responseTime": started.elapsed().as_millis() as u64,
                    },
                    "worker": reply,
                }),
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Event bus health check failed");
            Dependencies {
                ready: false,
                report: json!({ "eventBus": { "status": "DOWN", "error": e.to_string() } }),
            }
        }
    }
}

pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let deps = check_dependencies(&state).await;
    if deps.ready {
        (
            StatusCode::OK,
            Json(json!({ "status": "READY", "timestamp": now(), "dependencies": deps.report })),
        )
    } else {
        tracing::error!("Readiness check failed");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "NOT_READY", "timestamp": now(), "dependencies": deps.report })),
        )
    }
}

pub async fn detailed(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let deps = check_dependencies(&state).await;
    let breakers = state.breakers.list_all();
    let open = breakers.iter().filter(|m| m.is_open()).count();
    let pool = state.bridge.pool();

    let status = if deps.ready { "UP" } else { "DEGRADED" };
    let code = if deps.ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (
        code,
        Json(json!({
            "status": status,
            "timestamp": now(),
            "uptime": state.uptime_ms(),
            "dependencies": deps.report,
            "workerPool": {
                "size": pool.size(),
                "inFlight": pool.in_flight(),
                "shutDown": pool.is_shut_down(),
            },
            "circuitBreakers": {
                "total": breakers.len(),
                "open": open,
            },
            "system": {
                "processors": std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
                "os": std::env::consts::OS,
                "arch": std::env::consts::ARCH,
            },
            "configuration": {
                "bindAddress": state.config.server.bind_address,
                "workerPoolSize": state.config.worker.pool_size,
                "apiPrefix": state.config.server.api_prefix,
            },
        })),
    )
}

pub async fn circuit_breakers(State(state): State<AppState>) -> Json<Value> {
    let breakers: Vec<CircuitBreakerStatus> = state
        .breakers
        .list_all()
        .iter()
        .map(CircuitBreakerStatus::from)
        .collect();
    Json(json!({
        "timestamp": now(),
        "total": breakers.len(),
        "circuitBreakers": breakers,
    }))
}
