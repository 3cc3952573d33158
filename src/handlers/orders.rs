use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::common::PaginationParams;
use crate::auth::Principal;
use crate::entities::order::OrderStatus;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::orders::{
    AddServiceRequest, AppointmentResponse, AssignMechanicRequest, CreateOrderRequest,
    InspectionResponse, OrderDetailsResponse, OrderListResponse, OrderResponse, ServiceLineResponse,
    UpdateInspectionRequest, UpdateOrderStatusRequest,
};
use crate::ApiResponse;

#[derive(Debug, Deserialize, IntoParams)]
pub struct OrderListFilter {
    /// Restrict to one lifecycle status
    pub status: Option<OrderStatus>,
    /// Restrict to one customer
    pub customer_id: Option<Uuid>,
}

/// Book a repair order
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created with its service lines", body = crate::ApiResponse<crate::services::orders::OrderDetailsResponse>,
            headers(("X-Request-Id" = String, description = "Unique request identifier"))),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Booking on behalf of another customer", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown service definition", body = crate::errors::ErrorResponse),
        (status = 409, description = "Duplicate service or slot fully booked", body = crate::errors::ErrorResponse)
    ),
    security(("gateway_auth" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderDetailsResponse>>), ServiceError> {
    let order = state
        .services
        .orders
        .create_order(&principal, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

/// List orders
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(PaginationParams, OrderListFilter),
    responses(
        (status = 200, description = "Orders, newest first", body = crate::ApiResponse<crate::services::orders::OrderListResponse>,
            headers(("X-Request-Id" = String, description = "Unique request identifier"))),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Staff role required", body = crate::errors::ErrorResponse)
    ),
    security(("gateway_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    principal: Principal,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<OrderListFilter>,
) -> Result<Json<ApiResponse<OrderListResponse>>, ServiceError> {
    let orders = state
        .services
        .orders
        .list_orders(
            &principal,
            filter.status,
            filter.customer_id,
            pagination.page,
            pagination.per_page,
        )
        .await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// Get an order with its lines, inspection and appointment
#[utoipa::path(
    get,
    path = "/api/v1/orders/:id",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order details", body = crate::ApiResponse<crate::services::orders::OrderDetailsResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not the owning customer", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("gateway_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderDetailsResponse>>, ServiceError> {
    let order = state.services.orders.get_order(&principal, id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Add a service line to an open order
#[utoipa::path(
    post,
    path = "/api/v1/orders/:id/add-service",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    request_body = AddServiceRequest,
    responses(
        (status = 201, description = "Service line added, order total updated", body = crate::ApiResponse<crate::services::orders::ServiceLineResponse>,
            headers(("X-Request-Id" = String, description = "Unique request identifier"))),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not the owning customer", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown order or service definition", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order closed or service already present", body = crate::errors::ErrorResponse)
    ),
    security(("gateway_auth" = [])),
    tag = "Orders"
)]
pub async fn add_service(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(request): Json<AddServiceRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ServiceLineResponse>>), ServiceError> {
    let line = state
        .services
        .orders
        .add_service(&principal, id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(line))))
}

/// Assign a mechanic to an order
#[utoipa::path(
    post,
    path = "/api/v1/orders/:id/assign-mechanic",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    request_body = AssignMechanicRequest,
    responses(
        (status = 201, description = "Mechanic assigned, work started", body = crate::ApiResponse<crate::services::orders::AppointmentResponse>,
            headers(("X-Request-Id" = String, description = "Unique request identifier"))),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 403, description = "Staff role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Mechanic double-booked or slot fully booked", body = crate::errors::ErrorResponse)
    ),
    security(("gateway_auth" = [])),
    tag = "Orders"
)]
pub async fn assign_mechanic(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignMechanicRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AppointmentResponse>>), ServiceError> {
    let appointment = state
        .services
        .orders
        .assign_mechanic(&principal, id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(appointment))))
}

/// Promote a completed inspection into the primary service
#[utoipa::path(
    post,
    path = "/api/v1/orders/:id/transfer-to-service",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Inspection line reclassified as primary", body = crate::ApiResponse<crate::services::orders::OrderDetailsResponse>,
            headers(("X-Request-Id" = String, description = "Unique request identifier"))),
        (status = 403, description = "Staff role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order not eligible for transfer", body = crate::errors::ErrorResponse)
    ),
    security(("gateway_auth" = [])),
    tag = "Orders"
)]
pub async fn transfer_to_service(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderDetailsResponse>>, ServiceError> {
    let order = state
        .services
        .orders
        .transfer_inspection_to_service(&principal, id)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Move an order to a new lifecycle status
#[utoipa::path(
    put,
    path = "/api/v1/orders/:id",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Order status updated", body = crate::ApiResponse<crate::services::orders::OrderResponse>,
            headers(("X-Request-Id" = String, description = "Unique request identifier"))),
        (status = 403, description = "Staff role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    security(("gateway_auth" = [])),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .orders
        .set_status(&principal, id, request.status)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Record inspection findings and optionally advance the inspection
#[utoipa::path(
    put,
    path = "/api/v1/orders/:id/inspection",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    request_body = UpdateInspectionRequest,
    responses(
        (status = 200, description = "Inspection updated", body = crate::ApiResponse<crate::services::orders::InspectionResponse>,
            headers(("X-Request-Id" = String, description = "Unique request identifier"))),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 403, description = "Staff role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order has no inspection", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    security(("gateway_auth" = [])),
    tag = "Orders"
)]
pub async fn record_inspection(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateInspectionRequest>,
) -> Result<Json<ApiResponse<InspectionResponse>>, ServiceError> {
    let inspection = state
        .services
        .orders
        .record_inspection_results(&principal, id, request)
        .await?;
    Ok(Json(ApiResponse::success(inspection)))
}

/// Order routes
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order))
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id", put(update_order_status))
        .route("/:id/add-service", post(add_service))
        .route("/:id/assign-mechanic", post(assign_mechanic))
        .route("/:id/transfer-to-service", post(transfer_to_service))
        .route("/:id/inspection", put(record_inspection))
}
