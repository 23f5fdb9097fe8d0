//! Integration tests for the unauthenticated operational surface: health
//! probes and the OpenAPI document.
//!
//! Run with: `cargo test -p tempo-api --test health_test`
//! Requires Docker for testcontainers (Postgres).

mod helpers;

use helpers::setup_test_app;
use serde_json::Value;

#[tokio::test]
async fn test_liveness_and_readiness_answer_without_auth() {
    let app = setup_test_app().await;
    let client = app.client();

    let response = client.get("/health/live").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["status"], "alive");

    let response = client.get("/health/ready").await;
    assert_eq!(response.status_code(), 200);
    let body = response.json::<Value>();
    assert_eq!(body["status"], "ready");
    assert_eq!(body["database"], "ready");
}

#[tokio::test]
async fn test_full_health_check_reports_row_security() {
    let app = setup_test_app().await;
    let client = app.client();

    let response = client.get("/health").await;
    assert_eq!(response.status_code(), 200);

    let body = response.json::<Value>();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "healthy");
    assert_eq!(body["row_security"], "healthy");

    let policies = body["policies"].as_array().unwrap();
    let names: Vec<&str> = policies.iter().filter_map(Value::as_str).collect();
    assert!(names.contains(&"projects_tenant_isolation"));
    assert!(names.contains(&"clients_tenant_isolation"));
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = setup_test_app().await;
    let client = app.client();

    let response = client.get("/api/openapi.json").await;
    assert_eq!(response.status_code(), 200);

    let document = response.json::<Value>();
    assert_eq!(document["info"]["title"], "Tempo API");
    assert!(
        document["paths"]
            .as_object()
            .unwrap()
            .contains_key("/api/v1/organizations"),
        "The document must describe the versioned routes"
    );

    let response = client.get("/docs").await;
    assert_eq!(response.status_code(), 200);
}
