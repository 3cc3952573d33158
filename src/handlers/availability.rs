use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::auth::Principal;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::scheduler::SlotAvailability;
use crate::ApiResponse;

#[derive(Debug, Deserialize, IntoParams)]
pub struct AvailabilityQuery {
    /// Calendar day to inspect (YYYY-MM-DD)
    pub date: NaiveDate,
}

/// Remaining capacity per time slot for one day
#[utoipa::path(
    get,
    path = "/api/v1/availability",
    params(AvailabilityQuery),
    responses(
        (status = 200, description = "Availability per slot, in shop order", body = crate::ApiResponse<Vec<crate::services::scheduler::SlotAvailability>>,
            headers(("X-Request-Id" = String, description = "Unique request identifier"))),
        (status = 400, description = "Past or malformed date", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("gateway_auth" = [])),
    tag = "Availability"
)]
pub async fn get_availability(
    State(state): State<AppState>,
    _principal: Principal,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<ApiResponse<Vec<SlotAvailability>>>, ServiceError> {
    let slots = state
        .services
        .scheduler
        .get_availability(query.date)
        .await?;
    Ok(Json(ApiResponse::success(slots)))
}

/// Availability routes
pub fn availability_routes() -> Router<AppState> {
    Router::new().route("/", get(get_availability))
}
