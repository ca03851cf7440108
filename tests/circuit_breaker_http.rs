//! Breaker behaviour observed through the HTTP surface.

use resilient_api::config::DelayConfig;
use resilient_api::resilience::CircuitBreakerConfig;
use serde_json::Value;

mod common;

#[tokio::test]
async fn test_repeated_failures_open_database_breaker() {
    let mut config = common::fast_config();
    config
        .circuit_breakers
        .insert("database".into(), CircuitBreakerConfig::new(2, 1, 1_000, 60_000));
    let server = common::spawn_server(config).await;

    for id in ["404", "405"] {
        let res = server.client.get(server.api(&format!("/users/{}", id))).send().await.unwrap();
        assert_eq!(res.status(), 404);
    }

    let res = server
        .client
        .get(server.api("/users/1"))
        .header("X-Correlation-ID", "breaker-open-test")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 503);
    assert_eq!(res.headers()["x-correlation-id"], "breaker-open-test");
    assert!(res.headers().contains_key("x-error-id"));

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], 503);
    assert_eq!(body["path"], "/api/users/1");
    assert_eq!(body["correlationId"], "breaker-open-test");
    assert!(body["error"].as_str().unwrap().contains("database"));

    let listing: Value = server
        .client
        .get(server.url("/health/circuit-breakers"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let database = listing["circuitBreakers"]
        .as_array()
        .unwrap()
        .iter()
        .find(|b| b["name"] == "database")
        .unwrap();
    assert_eq!(database["state"], "OPEN");
    assert_eq!(database["failureCount"], 2);
    assert_ne!(database["timeSinceLastFailure"], "Never");
}

#[tokio::test]
async fn test_slow_operation_times_out_with_504() {
    let mut config = common::fast_config();
    config.service.fetch = DelayConfig::new(500, 0);
    config
        .circuit_breakers
        .insert("database".into(), CircuitBreakerConfig::new(5, 1, 50, 60_000));
    let server = common::spawn_server(config).await;

    let started = std::time::Instant::now();
    let res = server.client.get(server.api("/users/1")).send().await.unwrap();
    assert_eq!(res.status(), 504);
    assert!(started.elapsed() < std::time::Duration::from_millis(450));

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], 504);
}

#[tokio::test]
async fn test_validation_errors_do_not_touch_breaker() {
    let mut config = common::fast_config();
    config
        .circuit_breakers
        .insert("database".into(), CircuitBreakerConfig::new(1, 1, 1_000, 60_000));
    let server = common::spawn_server(config).await;

    let res = server
        .client
        .post(server.api("/users"))
        .json(&serde_json::json!({ "name": "Ann" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "User email is required");

    let res = server.client.get(server.api("/users/1")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let user: Value = res.json().await.unwrap();
    assert_eq!(user["name"], "John Doe");
}
