//! Smoke tests for the HTTP surface itself: envelope shape, health and
//! status endpoints, and authentication failures before any handler runs.

mod common;

use axum::{body, http::Method, response::Response};
use common::TestApp;
use serde_json::{json, Value};

async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

#[tokio::test]
async fn test_status_and_health_respond_without_authentication() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/status", None, None).await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["service"], "autoshop-api");
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["environment"], "test");

    let response = app.request(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["checks"]["database"], "healthy");
}

#[tokio::test]
async fn test_error_envelope_carries_machine_readable_codes() {
    let app = TestApp::new().await;

    // Missing identity headers.
    let response = app.request(Method::GET, "/api/v1/orders", None, None).await;
    assert_eq!(response.status(), 401);
    let body = response_json(response).await;
    assert_eq!(body["code"], "unauthorized");
    assert_eq!(body["error"], "Unauthorized");
    assert!(body["message"].as_str().expect("message").contains("x-user-id"));
    assert!(body["timestamp"].is_string());

    // A role outside the known set is rejected the same way.
    let request = axum::http::Request::builder()
        .method(Method::GET)
        .uri("/api/v1/orders")
        .header("x-user-id", uuid::Uuid::new_v4().to_string())
        .header("x-user-role", "janitor")
        .body(axum::body::Body::empty())
        .expect("request build");
    let response = tower::ServiceExt::oneshot(app.router.clone(), request)
        .await
        .expect("request handled");
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_unknown_routes_fall_through_to_404() {
    let app = TestApp::new().await;

    let response = app
        .request_as(&app.admin, Method::GET, "/api/v1/warranties", None)
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_malformed_bodies_are_rejected_before_the_services_run() {
    let app = TestApp::new().await;

    // A payload missing required fields never reaches the order service.
    let response = app
        .request_as(
            &app.customer,
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "payment_method": "cash" })),
        )
        .await;
    assert!(response.status().is_client_error());

    let listed = app
        .request_as(&app.admin, Method::GET, "/api/v1/orders", None)
        .await;
    let listed = response_json(listed).await;
    assert_eq!(listed["data"]["total"], 0);
}
