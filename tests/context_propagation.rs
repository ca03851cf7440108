//! Correlation context carried from HTTP through the bus to worker threads.

use serde_json::Value;

mod common;

#[tokio::test]
async fn test_generated_ids_are_echoed() {
    let server = common::spawn_server(common::fast_config()).await;

    let res = server.client.get(server.api("/common")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let correlation = res.headers()["x-correlation-id"].to_str().unwrap().to_string();
    let request = res.headers()["x-request-id"].to_str().unwrap().to_string();
    assert!(!correlation.is_empty());
    assert!(!request.is_empty());

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "success");
}

#[tokio::test]
async fn test_analytics_report_carries_request_context() {
    let server = common::spawn_server(common::fast_config()).await;

    let res = server
        .client
        .get(server.api("/products/analytics/report"))
        .header("X-Correlation-ID", "trace-me-123")
        .header("X-Tenant-ID", "acme")
        .header("X-User-ID", "user-9")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-correlation-id"], "trace-me-123");

    let report: Value = res.json().await.unwrap();
    assert_eq!(report["correlationId"], "trace-me-123");
    assert_eq!(report["tenantId"], "acme");
    assert_eq!(report["userId"], "user-9");
    assert_eq!(report["reportType"], "analytics");
    assert_eq!(report["status"], "completed");
}

#[tokio::test]
async fn test_batch_delete_requires_confirmation() {
    let server = common::spawn_server(common::fast_config()).await;

    let res = server
        .client
        .post(server.api("/products/batch/delete"))
        .header("X-Correlation-ID", "batch-1")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Delete operation requires explicit confirmation");
    assert_eq!(body["correlationId"], "batch-1");

    let res = server
        .client
        .post(server.api("/products/batch/delete?confirmDelete=true"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["operation"], "delete");
    assert!(body["recordsProcessed"].as_u64().unwrap() >= 1_000);
}

#[tokio::test]
async fn test_unsupported_batch_operation() {
    let server = common::spawn_server(common::fast_config()).await;

    let res = server
        .client
        .post(server.api("/products/batch/explode"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("Unsupported batch operation: explode"));
}
