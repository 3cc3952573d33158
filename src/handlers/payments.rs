use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};

use crate::auth::Principal;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::payments::{
    PaymentConfirmationResponse, ProcessCashPaymentRequest, ProcessOnlinePaymentRequest,
};
use crate::ApiResponse;

/// Settle an invoice paid in cash at the counter
#[utoipa::path(
    post,
    path = "/api/v1/payments/process-cash-payment",
    request_body = ProcessCashPaymentRequest,
    responses(
        (status = 200, description = "Invoice settled", body = crate::ApiResponse<crate::services::payments::PaymentConfirmationResponse>,
            headers(("X-Request-Id" = String, description = "Unique request identifier"))),
        (status = 403, description = "Staff role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Invoice not awaiting cash payment or already paid", body = crate::errors::ErrorResponse)
    ),
    security(("gateway_auth" = [])),
    tag = "Payments"
)]
pub async fn process_cash_payment(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<ProcessCashPaymentRequest>,
) -> Result<Json<ApiResponse<PaymentConfirmationResponse>>, ServiceError> {
    let confirmation = state
        .services
        .payments
        .process_cash_payment(&principal, request)
        .await?;
    Ok(Json(ApiResponse::success(confirmation)))
}

/// Settle an invoice paid through the online provider
#[utoipa::path(
    post,
    path = "/api/v1/payments/process-online-payment",
    request_body = ProcessOnlinePaymentRequest,
    responses(
        (status = 200, description = "Invoice settled", body = crate::ApiResponse<crate::services::payments::PaymentConfirmationResponse>,
            headers(("X-Request-Id" = String, description = "Unique request identifier"))),
        (status = 400, description = "Missing payment reference", body = crate::errors::ErrorResponse),
        (status = 403, description = "Staff role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Invoice not payable online or already paid", body = crate::errors::ErrorResponse)
    ),
    security(("gateway_auth" = [])),
    tag = "Payments"
)]
pub async fn process_online_payment(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<ProcessOnlinePaymentRequest>,
) -> Result<Json<ApiResponse<PaymentConfirmationResponse>>, ServiceError> {
    let confirmation = state
        .services
        .payments
        .process_online_payment(&principal, request)
        .await?;
    Ok(Json(ApiResponse::success(confirmation)))
}

/// Payment routes
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/process-cash-payment", post(process_cash_payment))
        .route("/process-online-payment", post(process_online_payment))
}
