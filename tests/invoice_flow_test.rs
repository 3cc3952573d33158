//! Invoice generation and payment reconciliation tests.
//!
//! Covers generation from completed orders (totals, tax, idempotency),
//! the cash and online settlement paths, derived overdue reporting, and
//! access control on the billing surface.

mod common;

use axum::{body, http::Method, response::Response};
use chrono::{DateTime, Duration, Utc};
use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{json, Value};
use uuid::Uuid;

use autoshop_api::entities::{invoice, service_definition::ServiceCategory};

async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

fn decimal_field(value: &Value) -> Decimal {
    value
        .as_str()
        .and_then(|raw| raw.parse().ok())
        .expect("decimal field")
}

fn timestamp_field(value: &Value) -> DateTime<Utc> {
    value
        .as_str()
        .and_then(|raw| raw.parse().ok())
        .expect("timestamp field")
}

/// Books an engine overhaul with two extras (2000 + 500 + 300) and walks
/// the order to completed so it can be invoiced.
async fn build_completed_order(app: &TestApp, payment_method: &str) -> String {
    let engine = app
        .seed_service("Engine overhaul", ServiceCategory::Repair, dec!(2000.00))
        .await;
    let full_service = app
        .seed_service("Full service", ServiceCategory::Maintenance, dec!(500.00))
        .await;
    let brake_fluid = app
        .seed_service("Brake fluid change", ServiceCategory::Maintenance, dec!(300.00))
        .await;

    let payload = json!({
        "vehicle_id": Uuid::new_v4(),
        "service_id": engine.id,
        "additional_service_ids": [full_service.id, brake_fluid.id],
        "payment_method": payment_method
    });
    let response = app
        .request_as(&app.customer, Method::POST, "/api/v1/orders", Some(payload))
        .await;
    assert_eq!(response.status(), 201);
    let body = response_json(response).await;
    let order_id = body["data"]["order"]["id"]
        .as_str()
        .expect("order id")
        .to_string();

    for status in ["in_progress", "completed"] {
        let response = app
            .request_as(
                &app.mechanic,
                Method::PUT,
                &format!("/api/v1/orders/{}", order_id),
                Some(json!({ "status": status })),
            )
            .await;
        assert_eq!(response.status(), 200);
    }

    order_id
}

async fn generate_invoice(app: &TestApp, order_id: &str) -> Value {
    let response = app
        .request_as(
            &app.mechanic,
            Method::POST,
            &format!("/api/v1/invoices/generate-from-order/{}", order_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 201);
    response_json(response).await
}

// ==================== Generation ====================

#[tokio::test]
async fn test_invoice_snapshots_totals_with_tax() {
    let app = TestApp::new().await;
    let order_id = build_completed_order(&app, "cash").await;

    let body = generate_invoice(&app, &order_id).await;
    let invoice = &body["data"]["invoice"];

    assert_eq!(body["data"]["is_existing"], false);
    assert_eq!(body["data"]["payment_method"], "cash");
    assert_eq!(decimal_field(&invoice["sub_total"]), dec!(2800.00));
    assert_eq!(decimal_field(&invoice["tax_amount"]), dec!(504.00));
    assert_eq!(decimal_field(&invoice["total_amount"]), dec!(3304.00));
    assert_eq!(invoice["status"], "pending_cash");
    assert!(invoice["paid_at"].is_null());
    assert!(invoice["invoice_number"]
        .as_str()
        .expect("invoice number")
        .starts_with("INV-"));

    // Due date sits the configured grace period after issue.
    let issued_at = timestamp_field(&invoice["invoice_date"]);
    let due_at = timestamp_field(&invoice["due_date"]);
    assert_eq!(due_at - issued_at, Duration::days(7));

    // One item per order line, in order.
    let items = body["data"]["items"].as_array().expect("items");
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["description"], "Engine overhaul");
    assert_eq!(decimal_field(&items[0]["unit_price"]), dec!(2000.00));
    assert_eq!(items[1]["description"], "Full service");
    assert_eq!(items[2]["description"], "Brake fluid change");
    assert!(items.iter().all(|item| item["quantity"] == 1));

    // The order now points back at its invoice.
    let details = app
        .request_as(
            &app.mechanic,
            Method::GET,
            &format!("/api/v1/orders/{}", order_id),
            None,
        )
        .await;
    let details = response_json(details).await;
    assert_eq!(details["data"]["order"]["invoice_id"], invoice["id"]);
}

#[tokio::test]
async fn test_invoice_generation_is_idempotent_per_order() {
    let app = TestApp::new().await;
    let order_id = build_completed_order(&app, "cash").await;

    let first = generate_invoice(&app, &order_id).await;
    let first_id = first["data"]["invoice"]["id"].as_str().expect("invoice id");

    let response = app
        .request_as(
            &app.mechanic,
            Method::POST,
            &format!("/api/v1/invoices/generate-from-order/{}", order_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let second = response_json(response).await;
    assert_eq!(second["data"]["is_existing"], true);
    assert_eq!(second["data"]["invoice"]["id"], first_id);
    assert_eq!(
        decimal_field(&second["data"]["invoice"]["total_amount"]),
        dec!(3304.00)
    );
}

#[tokio::test]
async fn test_only_completed_orders_can_be_invoiced() {
    let app = TestApp::new().await;
    let repair = app
        .seed_service("Gearbox repair", ServiceCategory::Repair, dec!(1500.00))
        .await;

    let payload = json!({
        "vehicle_id": Uuid::new_v4(),
        "service_id": repair.id,
        "payment_method": "cash"
    });
    let response = app
        .request_as(&app.customer, Method::POST, "/api/v1/orders", Some(payload))
        .await;
    let body = response_json(response).await;
    let order_id = body["data"]["order"]["id"].as_str().expect("order id");

    let response = app
        .request_as(
            &app.mechanic,
            Method::POST,
            &format!("/api/v1/invoices/generate-from-order/{}", order_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 409);
    let body = response_json(response).await;
    assert_eq!(body["code"], "illegal_transition");

    let missing = app
        .request_as(
            &app.mechanic,
            Method::POST,
            &format!("/api/v1/invoices/generate-from-order/{}", Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn test_invoice_generation_requires_staff() {
    let app = TestApp::new().await;
    let order_id = build_completed_order(&app, "cash").await;

    let response = app
        .request_as(
            &app.customer,
            Method::POST,
            &format!("/api/v1/invoices/generate-from-order/{}", order_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 403);
}

// ==================== Cash Settlement ====================

#[tokio::test]
async fn test_cash_payment_settles_a_pending_cash_invoice_exactly_once() {
    let app = TestApp::new().await;
    let order_id = build_completed_order(&app, "cash").await;
    let body = generate_invoice(&app, &order_id).await;
    let invoice_id = body["data"]["invoice"]["id"].as_str().expect("invoice id");

    let response = app
        .request_as(
            &app.mechanic,
            Method::POST,
            "/api/v1/payments/process-cash-payment",
            Some(json!({ "invoice_id": invoice_id })),
        )
        .await;
    assert_eq!(response.status(), 200);
    let confirmation = response_json(response).await;
    assert_eq!(confirmation["data"]["status"], "paid");
    assert_eq!(
        decimal_field(&confirmation["data"]["amount"]),
        dec!(3304.00)
    );
    assert!(confirmation["data"]["paid_at"].is_string());
    assert!(confirmation["data"]["payment_reference"].is_null());

    // Settling twice is rejected and the row keeps its first paid_at.
    let repeat = app
        .request_as(
            &app.mechanic,
            Method::POST,
            "/api/v1/payments/process-cash-payment",
            Some(json!({ "invoice_id": invoice_id })),
        )
        .await;
    assert_eq!(repeat.status(), 409);
    let repeat = response_json(repeat).await;
    assert_eq!(repeat["code"], "already_paid");

    let details = app
        .request_as(
            &app.mechanic,
            Method::GET,
            &format!("/api/v1/invoices/{}", invoice_id),
            None,
        )
        .await;
    let details = response_json(details).await;
    assert_eq!(details["data"]["invoice"]["status"], "paid");
    assert_eq!(
        details["data"]["invoice"]["paid_at"],
        confirmation["data"]["paid_at"]
    );
}

#[tokio::test]
async fn test_cash_payment_rejects_invoices_issued_for_online_settlement() {
    let app = TestApp::new().await;
    let order_id = build_completed_order(&app, "online").await;
    let body = generate_invoice(&app, &order_id).await;
    let invoice = &body["data"]["invoice"];
    assert_eq!(invoice["status"], "issued");

    let response = app
        .request_as(
            &app.mechanic,
            Method::POST,
            "/api/v1/payments/process-cash-payment",
            Some(json!({ "invoice_id": invoice["id"] })),
        )
        .await;
    assert_eq!(response.status(), 409);
    let body = response_json(response).await;
    assert_eq!(body["code"], "illegal_transition");
}

// ==================== Online Settlement ====================

#[tokio::test]
async fn test_online_payment_records_the_gateway_reference() {
    let app = TestApp::new().await;
    let order_id = build_completed_order(&app, "online").await;
    let body = generate_invoice(&app, &order_id).await;
    let invoice_id = body["data"]["invoice"]["id"].as_str().expect("invoice id");

    // The desk flow does not apply to an issued invoice.
    let payload = json!({
        "invoice_id": invoice_id,
        "payment_reference": "TXN-20260823-0001"
    });
    let response = app
        .request_as(
            &app.mechanic,
            Method::POST,
            "/api/v1/payments/process-online-payment",
            Some(payload),
        )
        .await;
    assert_eq!(response.status(), 200);
    let confirmation = response_json(response).await;
    assert_eq!(confirmation["data"]["status"], "paid");
    assert_eq!(
        confirmation["data"]["payment_reference"],
        "TXN-20260823-0001"
    );

    let repeat = app
        .request_as(
            &app.mechanic,
            Method::POST,
            "/api/v1/payments/process-online-payment",
            Some(json!({
                "invoice_id": invoice_id,
                "payment_reference": "TXN-20260823-0002"
            })),
        )
        .await;
    assert_eq!(repeat.status(), 409);
    let repeat = response_json(repeat).await;
    assert_eq!(repeat["code"], "already_paid");

    // The stored reference is the one from the successful settlement.
    let details = app
        .request_as(
            &app.mechanic,
            Method::GET,
            &format!("/api/v1/invoices/{}", invoice_id),
            None,
        )
        .await;
    let details = response_json(details).await;
    assert_eq!(
        details["data"]["invoice"]["payment_reference"],
        "TXN-20260823-0001"
    );
}

#[tokio::test]
async fn test_online_payment_requires_a_reference_and_an_issued_invoice() {
    let app = TestApp::new().await;
    let order_id = build_completed_order(&app, "cash").await;
    let body = generate_invoice(&app, &order_id).await;
    let invoice_id = body["data"]["invoice"]["id"].as_str().expect("invoice id");

    let blank = app
        .request_as(
            &app.mechanic,
            Method::POST,
            "/api/v1/payments/process-online-payment",
            Some(json!({ "invoice_id": invoice_id, "payment_reference": "" })),
        )
        .await;
    assert_eq!(blank.status(), 400);
    let blank = response_json(blank).await;
    assert_eq!(blank["code"], "validation_error");

    // A pending_cash invoice cannot be settled online.
    let wrong_flow = app
        .request_as(
            &app.mechanic,
            Method::POST,
            "/api/v1/payments/process-online-payment",
            Some(json!({
                "invoice_id": invoice_id,
                "payment_reference": "TXN-20260823-0099"
            })),
        )
        .await;
    assert_eq!(wrong_flow.status(), 409);
    let wrong_flow = response_json(wrong_flow).await;
    assert_eq!(wrong_flow["code"], "illegal_transition");
}

// ==================== Overdue Reporting ====================

#[tokio::test]
async fn test_overdue_is_derived_on_read_and_never_blocks_payment() {
    let app = TestApp::new().await;
    let order_id = build_completed_order(&app, "online").await;
    let body = generate_invoice(&app, &order_id).await;
    let invoice_id: Uuid = body["data"]["invoice"]["id"]
        .as_str()
        .and_then(|raw| raw.parse().ok())
        .expect("invoice id");

    // Backdate the due date; the stored status stays issued.
    let backdated = invoice::ActiveModel {
        id: Set(invoice_id),
        due_date: Set(Utc::now() - Duration::days(3)),
        ..Default::default()
    };
    backdated
        .update(&*app.state.db)
        .await
        .expect("backdate due date");

    let details = app
        .request_as(
            &app.mechanic,
            Method::GET,
            &format!("/api/v1/invoices/{}", invoice_id),
            None,
        )
        .await;
    let details = response_json(details).await;
    assert_eq!(details["data"]["invoice"]["status"], "overdue");

    // The status filter works on the derived status.
    let overdue = app
        .request_as(
            &app.mechanic,
            Method::GET,
            "/api/v1/invoices?status=overdue",
            None,
        )
        .await;
    let overdue = response_json(overdue).await;
    assert_eq!(overdue["data"]["total"], 1);
    assert_eq!(overdue["data"]["invoices"][0]["status"], "overdue");

    let issued = app
        .request_as(
            &app.mechanic,
            Method::GET,
            "/api/v1/invoices?status=issued",
            None,
        )
        .await;
    let issued = response_json(issued).await;
    assert_eq!(issued["data"]["total"], 0);

    // Payment still goes through: overdue is reporting, not a state.
    let response = app
        .request_as(
            &app.mechanic,
            Method::POST,
            "/api/v1/payments/process-online-payment",
            Some(json!({
                "invoice_id": invoice_id,
                "payment_reference": "TXN-LATE-0001"
            })),
        )
        .await;
    assert_eq!(response.status(), 200);

    let overdue = app
        .request_as(
            &app.mechanic,
            Method::GET,
            "/api/v1/invoices?status=overdue",
            None,
        )
        .await;
    let overdue = response_json(overdue).await;
    assert_eq!(overdue["data"]["total"], 0);

    let paid = app
        .request_as(
            &app.mechanic,
            Method::GET,
            "/api/v1/invoices?status=paid",
            None,
        )
        .await;
    let paid = response_json(paid).await;
    assert_eq!(paid["data"]["total"], 1);
}

// ==================== Access Control ====================

#[tokio::test]
async fn test_invoice_access_is_scoped_to_owner_and_staff() {
    let app = TestApp::new().await;
    let order_id = build_completed_order(&app, "cash").await;
    let body = generate_invoice(&app, &order_id).await;
    let invoice_id = body["data"]["invoice"]["id"].as_str().expect("invoice id");
    let uri = format!("/api/v1/invoices/{}", invoice_id);

    // The owning customer can read their invoice.
    let own = app.request_as(&app.customer, Method::GET, &uri, None).await;
    assert_eq!(own.status(), 200);
    let own = response_json(own).await;
    assert_eq!(own["data"]["customer_id"], app.customer.id.to_string());

    let stranger = app.another_customer();
    let forbidden = app.request_as(&stranger, Method::GET, &uri, None).await;
    assert_eq!(forbidden.status(), 403);

    // Listing and payment processing are staff operations.
    let listing = app
        .request_as(&app.customer, Method::GET, "/api/v1/invoices", None)
        .await;
    assert_eq!(listing.status(), 403);

    let paying = app
        .request_as(
            &app.customer,
            Method::POST,
            "/api/v1/payments/process-cash-payment",
            Some(json!({ "invoice_id": invoice_id })),
        )
        .await;
    assert_eq!(paying.status(), 403);

    let staff_list = app
        .request_as(&app.admin, Method::GET, "/api/v1/invoices", None)
        .await;
    assert_eq!(staff_list.status(), 200);
    let staff_list = response_json(staff_list).await;
    assert_eq!(staff_list["data"]["total"], 1);
}
