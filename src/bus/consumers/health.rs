//! Worker-side health probe answered over the bus.

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::bus::{Body, EventBus};
use crate::error::ServiceError;
use crate::execution::WorkerPool;

pub const ADDRESS: &str = "app.health.check";

pub fn register(bus: &EventBus, pool: WorkerPool) {
    bus.register(ADDRESS, move |body| {
        let pool = pool.clone();
        async move { Ok::<_, ServiceError>(check(&body, &pool)) }
    });
}

pub fn check(body: &Body, pool: &WorkerPool) -> Value {
    tracing::debug!("Health check request received");
    let status = if pool.is_shut_down() { "DOWN" } else { "UP" };
    json!({
        "status": status,
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "workerHealth": status,
        "configurationLoaded": true,
        "requestTimestamp": body
            .get("timestamp")
            .and_then(Value::as_i64)
            .unwrap_or_else(|| Utc::now().timestamp_millis()),
        "workerPool": {
            "size": pool.size(),
            "inFlight": pool.in_flight(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;

    #[test]
    fn test_reports_pool_state() {
        let pool = WorkerPool::new(&WorkerConfig::default());
        let mut body = Body::new();
        body.insert("timestamp".into(), json!(42));

        let up = check(&body, &pool);
        assert_eq!(up["status"], json!("UP"));
        assert_eq!(up["requestTimestamp"], json!(42));
        assert_eq!(up["workerPool"]["size"], json!(10));

        pool.shutdown();
        assert_eq!(check(&body, &pool)["status"], json!("DOWN"));
    }
}
