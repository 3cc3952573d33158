//! Workshop scheduler tests: capacity under concurrency, release
//! behavior, and the availability view.

mod common;

use axum::{body, http::Method, response::Response};
use common::{in_days, tomorrow, TestApp};
use futures::future::join_all;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use autoshop_api::{entities::service_definition::ServiceCategory, errors::ServiceError};

async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

#[tokio::test]
async fn test_concurrent_reservations_never_exceed_capacity() {
    let app = TestApp::new().await;
    let scheduler = app.state.services.scheduler.clone();
    let date = tomorrow();

    let mut tasks = Vec::new();
    for _ in 0..12 {
        let scheduler = scheduler.clone();
        tasks.push(tokio::spawn(async move {
            scheduler.reserve(date, "09:00-11:00").await
        }));
    }

    let mut successes = 0;
    let mut full = 0;
    for outcome in join_all(tasks).await {
        match outcome.expect("task completed") {
            Ok(()) => successes += 1,
            Err(ServiceError::SlotFull(_)) => full += 1,
            Err(other) => panic!("unexpected reservation error: {:?}", other),
        }
    }

    assert_eq!(successes, 4, "exactly capacity reservations should win");
    assert_eq!(full, 8);

    let availability = scheduler.get_availability(date).await.expect("availability");
    let window = availability
        .iter()
        .find(|slot| slot.slot_label == "09:00-11:00")
        .expect("window present");
    assert_eq!(window.available_slots, 0);
    assert_eq!(window.total_slots, 4);

    // Other windows on the same day are untouched.
    let other = availability
        .iter()
        .find(|slot| slot.slot_label == "11:00-13:00")
        .expect("window present");
    assert_eq!(other.available_slots, 4);
}

#[tokio::test]
async fn test_release_restores_capacity_and_ignores_empty_buckets() {
    let app = TestApp::new().await;
    let scheduler = app.state.services.scheduler.clone();
    let date = tomorrow();

    scheduler.reserve(date, "11:00-13:00").await.expect("reserve");
    scheduler.reserve(date, "11:00-13:00").await.expect("reserve");

    scheduler.release(date, "11:00-13:00").await.expect("release");
    let availability = scheduler.get_availability(date).await.expect("availability");
    let window = availability
        .iter()
        .find(|slot| slot.slot_label == "11:00-13:00")
        .expect("window present");
    assert_eq!(window.available_slots, 3);

    // Draining past zero is a no-op, never a negative count.
    scheduler.release(date, "11:00-13:00").await.expect("release");
    scheduler.release(date, "11:00-13:00").await.expect("release");
    scheduler.release(date, "11:00-13:00").await.expect("release");

    let availability = scheduler.get_availability(date).await.expect("availability");
    let window = availability
        .iter()
        .find(|slot| slot.slot_label == "11:00-13:00")
        .expect("window present");
    assert_eq!(window.available_slots, 4);
}

#[tokio::test]
async fn test_availability_lists_windows_in_plan_order() {
    let app = TestApp::new().await;
    let scheduler = app.state.services.scheduler.clone();

    let availability = scheduler
        .get_availability(in_days(3))
        .await
        .expect("availability");

    let labels: Vec<&str> = availability
        .iter()
        .map(|slot| slot.slot_label.as_str())
        .collect();
    assert_eq!(
        labels,
        vec!["09:00-11:00", "11:00-13:00", "14:00-16:00", "16:00-18:00"]
    );
    assert!(availability
        .iter()
        .all(|slot| slot.available_slots == 4 && slot.total_slots == 4));
}

#[tokio::test]
async fn test_reservations_validate_date_and_label() {
    let app = TestApp::new().await;
    let scheduler = app.state.services.scheduler.clone();

    let unknown = scheduler.reserve(tomorrow(), "13:00-14:00").await;
    assert!(matches!(unknown, Err(ServiceError::InvalidSlot(_))));

    let past = scheduler.reserve(in_days(-1), "09:00-11:00").await;
    assert!(matches!(past, Err(ServiceError::InvalidSlot(_))));

    let past_view = scheduler.get_availability(in_days(-1)).await;
    assert!(matches!(past_view, Err(ServiceError::InvalidSlot(_))));
}

#[tokio::test]
async fn test_availability_endpoint_rejects_past_dates() {
    let app = TestApp::new().await;

    let response = app
        .request_as(
            &app.customer,
            Method::GET,
            &format!("/api/v1/availability?date={}", in_days(-1)),
            None,
        )
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert_eq!(body["code"], "invalid_slot");
}

#[tokio::test]
async fn test_booking_into_a_full_window_is_rejected() {
    let app = TestApp::new().await;
    let scheduler = app.state.services.scheduler.clone();
    let inspection = app
        .seed_service("MOT inspection", ServiceCategory::Inspection, dec!(54.85))
        .await;

    let date = in_days(2);
    for _ in 0..4 {
        scheduler.reserve(date, "14:00-16:00").await.expect("reserve");
    }

    let payload = json!({
        "vehicle_id": uuid::Uuid::new_v4(),
        "inspection_type_id": inspection.id,
        "date": date,
        "time_slot": "14:00-16:00",
        "payment_method": "cash"
    });
    let response = app
        .request_as(&app.customer, Method::POST, "/api/v1/orders", Some(payload))
        .await;
    assert_eq!(response.status(), 409);
    let body = response_json(response).await;
    assert_eq!(body["code"], "slot_full");

    // The failed booking left no order behind.
    let listed = app
        .request_as(&app.admin, Method::GET, "/api/v1/orders", None)
        .await;
    let listed = response_json(listed).await;
    assert_eq!(listed["data"]["total"], 0);
}
