//! Service catalog management tests: admin CRUD, listing filters, and
//! the referential guard protecting open orders.

mod common;

use axum::{body, http::Method, response::Response};
use common::TestApp;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use uuid::Uuid;

use autoshop_api::entities::service_definition::ServiceCategory;

async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

#[tokio::test]
async fn test_catalog_crud_is_admin_only() {
    let app = TestApp::new().await;

    let payload = json!({
        "name": "Cabin filter replacement",
        "category": "maintenance",
        "price": "45.00",
        "description": "Pollen filter swap"
    });

    // Mechanics and customers cannot manage the catalog.
    let response = app
        .request_as(
            &app.mechanic,
            Method::POST,
            "/api/v1/services",
            Some(payload.clone()),
        )
        .await;
    assert_eq!(response.status(), 403);
    let response = app
        .request_as(
            &app.customer,
            Method::POST,
            "/api/v1/services",
            Some(payload.clone()),
        )
        .await;
    assert_eq!(response.status(), 403);

    // Admin creates, updates, and deletes.
    let response = app
        .request_as(&app.admin, Method::POST, "/api/v1/services", Some(payload))
        .await;
    assert_eq!(response.status(), 201);
    let created = response_json(response).await;
    assert_eq!(created["data"]["name"], "Cabin filter replacement");
    assert_eq!(created["data"]["is_active"], true);
    assert_eq!(created["data"]["version"], 1);
    let service_id = created["data"]["id"].as_str().expect("service id").to_string();
    let uri = format!("/api/v1/services/{}", service_id);

    let response = app
        .request_as(
            &app.admin,
            Method::PUT,
            &uri,
            Some(json!({ "price": "52.50" })),
        )
        .await;
    assert_eq!(response.status(), 200);
    let updated = response_json(response).await;
    assert_eq!(updated["data"]["price"], "52.50");
    assert_eq!(updated["data"]["version"], 2);

    let forbidden_update = app
        .request_as(
            &app.mechanic,
            Method::PUT,
            &uri,
            Some(json!({ "price": "1.00" })),
        )
        .await;
    assert_eq!(forbidden_update.status(), 403);

    let response = app.request_as(&app.admin, Method::DELETE, &uri, None).await;
    assert_eq!(response.status(), 204);

    let response = app.request_as(&app.admin, Method::GET, &uri, None).await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_catalog_listing_filters_category_and_active_state() {
    let app = TestApp::new().await;
    app.seed_service("Brake pad replacement", ServiceCategory::Repair, dec!(250.00))
        .await;
    app.seed_service("Oil change", ServiceCategory::Maintenance, dec!(89.50))
        .await;
    let retired = app
        .seed_service("Carburetor tuning", ServiceCategory::Maintenance, dec!(150.00))
        .await;

    // Retire one entry.
    let response = app
        .request_as(
            &app.admin,
            Method::PUT,
            &format!("/api/v1/services/{}", retired.id),
            Some(json!({ "is_active": false })),
        )
        .await;
    assert_eq!(response.status(), 200);

    // Any authenticated caller can browse; inactive entries are hidden.
    let listed = app
        .request_as(&app.customer, Method::GET, "/api/v1/services", None)
        .await;
    assert_eq!(listed.status(), 200);
    let listed = response_json(listed).await;
    assert_eq!(listed["data"]["total"], 2);

    let maintenance = app
        .request_as(
            &app.customer,
            Method::GET,
            "/api/v1/services?category=maintenance",
            None,
        )
        .await;
    let maintenance = response_json(maintenance).await;
    assert_eq!(maintenance["data"]["total"], 1);
    assert_eq!(maintenance["data"]["services"][0]["name"], "Oil change");

    let with_inactive = app
        .request_as(
            &app.admin,
            Method::GET,
            "/api/v1/services?include_inactive=true",
            None,
        )
        .await;
    let with_inactive = response_json(with_inactive).await;
    assert_eq!(with_inactive["data"]["total"], 3);

    let anonymous = app
        .request(Method::GET, "/api/v1/services", None, None)
        .await;
    assert_eq!(anonymous.status(), 401);
}

#[tokio::test]
async fn test_retired_definitions_cannot_be_booked() {
    let app = TestApp::new().await;
    let retired = app
        .seed_service("Headlight polishing", ServiceCategory::Maintenance, dec!(60.00))
        .await;
    let response = app
        .request_as(
            &app.admin,
            Method::PUT,
            &format!("/api/v1/services/{}", retired.id),
            Some(json!({ "is_active": false })),
        )
        .await;
    assert_eq!(response.status(), 200);

    let payload = json!({
        "vehicle_id": Uuid::new_v4(),
        "service_id": retired.id,
        "payment_method": "cash"
    });
    let response = app
        .request_as(&app.customer, Method::POST, "/api/v1/orders", Some(payload))
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn test_definitions_on_open_orders_cannot_be_deleted() {
    let app = TestApp::new().await;
    let repair = app
        .seed_service("Alternator replacement", ServiceCategory::Repair, dec!(340.00))
        .await;
    let uri = format!("/api/v1/services/{}", repair.id);

    let payload = json!({
        "vehicle_id": Uuid::new_v4(),
        "service_id": repair.id,
        "payment_method": "cash"
    });
    let response = app
        .request_as(&app.customer, Method::POST, "/api/v1/orders", Some(payload))
        .await;
    assert_eq!(response.status(), 201);
    let body = response_json(response).await;
    let order_id = body["data"]["order"]["id"].as_str().expect("order id").to_string();

    // The open order blocks deletion.
    let blocked = app.request_as(&app.admin, Method::DELETE, &uri, None).await;
    assert_eq!(blocked.status(), 409);
    let blocked = response_json(blocked).await;
    assert_eq!(blocked["code"], "referential_conflict");

    // Once the order is closed the snapshot lines stand on their own.
    let cancel = app
        .request_as(
            &app.mechanic,
            Method::PUT,
            &format!("/api/v1/orders/{}", order_id),
            Some(json!({ "status": "cancelled" })),
        )
        .await;
    assert_eq!(cancel.status(), 200);

    let response = app.request_as(&app.admin, Method::DELETE, &uri, None).await;
    assert_eq!(response.status(), 204);

    // The closed order still shows its snapshot of the deleted entry.
    let details = app
        .request_as(
            &app.mechanic,
            Method::GET,
            &format!("/api/v1/orders/{}", order_id),
            None,
        )
        .await;
    let details = response_json(details).await;
    assert_eq!(
        details["data"]["service_lines"][0]["service_name"],
        "Alternator replacement"
    );
}

#[tokio::test]
async fn test_catalog_rejects_invalid_payloads() {
    let app = TestApp::new().await;

    let negative_price = json!({
        "name": "Free diagnosis",
        "category": "maintenance",
        "price": "-5.00"
    });
    let response = app
        .request_as(
            &app.admin,
            Method::POST,
            "/api/v1/services",
            Some(negative_price),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert_eq!(body["code"], "validation_error");

    let empty_name = json!({
        "name": "",
        "category": "repair",
        "price": "10.00"
    });
    let response = app
        .request_as(&app.admin, Method::POST, "/api/v1/services", Some(empty_name))
        .await;
    assert_eq!(response.status(), 400);

    let missing = app
        .request_as(
            &app.admin,
            Method::GET,
            &format!("/api/v1/services/{}", Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(missing.status(), 404);
}
