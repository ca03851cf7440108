//! Health and diagnostics endpoints, plus the CRUD happy paths.

use serde_json::{json, Value};

mod common;

async fn get_json(server: &common::TestServer, url: String) -> (u16, Value) {
    let res = server.client.get(url).send().await.unwrap();
    let status = res.status().as_u16();
    (status, res.json().await.unwrap())
}

#[tokio::test]
async fn test_health_family() {
    let server = common::spawn_server(common::fast_config()).await;

    let (status, body) = get_json(&server, server.url("/health")).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "UP");

    let (status, body) = get_json(&server, server.url("/health/liveness")).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ALIVE");

    let (status, body) = get_json(&server, server.url("/health/readiness")).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "READY");
    assert_eq!(body["dependencies"]["eventBus"]["status"], "UP");

    let (status, body) = get_json(&server, server.url("/health/detailed")).await;
    assert_eq!(status, 200);
    assert_eq!(body["workerPool"]["size"], 10);
    assert_eq!(body["circuitBreakers"]["open"], 0);
}

#[tokio::test]
async fn test_circuit_breaker_listing() {
    let server = common::spawn_server(common::fast_config()).await;

    let (status, body) = get_json(&server, server.url("/health/circuit-breakers")).await;
    assert_eq!(status, 200);

    let mut names: Vec<&str> = body["circuitBreakers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["name"].as_str().unwrap())
        .collect();
    names.sort_unstable();
    assert_eq!(names, vec!["analytics", "database", "external-api", "file-io"]);
    for breaker in body["circuitBreakers"].as_array().unwrap() {
        assert_eq!(breaker["state"], "CLOSED");
        assert_eq!(breaker["timeSinceLastFailure"], "Never");
    }
}

#[tokio::test]
async fn test_user_and_product_routes() {
    let server = common::spawn_server(common::fast_config()).await;

    let (status, body) = get_json(&server, server.api("/users")).await;
    assert_eq!(status, 200);
    assert_eq!(body["total"], 3);

    let res = server
        .client
        .post(server.api("/users"))
        .json(&json!({ "name": "Ann Lee", "email": "ann@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["user"]["name"], "Ann Lee");

    let res = server.client.delete(server.api("/users/2")).send().await.unwrap();
    assert_eq!(res.status(), 200);

    let (status, body) = get_json(&server, server.api("/products/1")).await;
    assert_eq!(status, 200);
    assert_eq!(body["name"], "Widget");

    let res = server
        .client
        .put(server.api("/products/1/stock"))
        .json(&json!({ "quantity": -3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    let res = server
        .client
        .put(server.api("/products/1/stock"))
        .json(&json!({ "quantity": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["product"]["inStock"], false);

    let (status, _) = get_json(&server, server.api("/products/77")).await;
    assert_eq!(status, 404);
}
