use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::common::PaginationParams;
use crate::auth::Principal;
use crate::entities::invoice::InvoiceStatus;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::invoicing::{
    InvoiceDetailsResponse, InvoiceGenerationResponse, InvoiceListResponse,
};
use crate::ApiResponse;

#[derive(Debug, Deserialize, IntoParams)]
pub struct InvoiceListFilter {
    /// Restrict to one payment state (issued, pending_cash, paid, overdue)
    pub status: Option<InvoiceStatus>,
}

/// Generate the invoice for a completed order
#[utoipa::path(
    post,
    path = "/api/v1/invoices/generate-from-order/:order_id",
    params(
        ("order_id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 201, description = "Invoice generated", body = crate::ApiResponse<crate::services::invoicing::InvoiceGenerationResponse>,
            headers(("X-Request-Id" = String, description = "Unique request identifier"))),
        (status = 200, description = "Invoice already existed; returned unchanged", body = crate::ApiResponse<crate::services::invoicing::InvoiceGenerationResponse>),
        (status = 403, description = "Staff role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order not completed yet", body = crate::errors::ErrorResponse)
    ),
    security(("gateway_auth" = [])),
    tag = "Invoices"
)]
pub async fn generate_invoice(
    State(state): State<AppState>,
    principal: Principal,
    Path(order_id): Path<Uuid>,
) -> Result<(StatusCode, Json<ApiResponse<InvoiceGenerationResponse>>), ServiceError> {
    let generated = state
        .services
        .invoicing
        .generate_from_order(&principal, order_id)
        .await?;

    let status = if generated.is_existing {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(ApiResponse::success(generated))))
}

/// Get an invoice with its line items
#[utoipa::path(
    get,
    path = "/api/v1/invoices/:id",
    params(
        ("id" = Uuid, Path, description = "Invoice ID")
    ),
    responses(
        (status = 200, description = "Invoice details", body = crate::ApiResponse<crate::services::invoicing::InvoiceDetailsResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not the owning customer", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("gateway_auth" = [])),
    tag = "Invoices"
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<InvoiceDetailsResponse>>, ServiceError> {
    let invoice = state.services.invoicing.get_invoice(&principal, id).await?;
    Ok(Json(ApiResponse::success(invoice)))
}

/// List invoices
#[utoipa::path(
    get,
    path = "/api/v1/invoices",
    params(PaginationParams, InvoiceListFilter),
    responses(
        (status = 200, description = "Invoices, newest first", body = crate::ApiResponse<crate::services::invoicing::InvoiceListResponse>,
            headers(("X-Request-Id" = String, description = "Unique request identifier"))),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Staff role required", body = crate::errors::ErrorResponse)
    ),
    security(("gateway_auth" = [])),
    tag = "Invoices"
)]
pub async fn list_invoices(
    State(state): State<AppState>,
    principal: Principal,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<InvoiceListFilter>,
) -> Result<Json<ApiResponse<InvoiceListResponse>>, ServiceError> {
    let invoices = state
        .services
        .invoicing
        .list_invoices(
            &principal,
            filter.status,
            pagination.page,
            pagination.per_page,
        )
        .await?;
    Ok(Json(ApiResponse::success(invoices)))
}

/// Invoice routes
pub fn invoice_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_invoices))
        .route("/:id", get(get_invoice))
        .route("/generate-from-order/:order_id", post(generate_invoice))
}
