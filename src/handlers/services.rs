use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::common::PaginationParams;
use crate::auth::Principal;
use crate::entities::service_definition::ServiceCategory;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::catalog::{
    CreateServiceDefinitionRequest, ServiceDefinitionListResponse, ServiceDefinitionResponse,
    UpdateServiceDefinitionRequest,
};
use crate::ApiResponse;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ServiceCatalogFilter {
    /// Restrict to one category (repair, maintenance, inspection)
    pub category: Option<ServiceCategory>,
    /// Include definitions that are no longer offered
    #[serde(default)]
    pub include_inactive: bool,
}

/// Add a service definition to the catalog
#[utoipa::path(
    post,
    path = "/api/v1/services",
    request_body = CreateServiceDefinitionRequest,
    responses(
        (status = 201, description = "Service definition created", body = crate::ApiResponse<crate::services::catalog::ServiceDefinitionResponse>,
            headers(("X-Request-Id" = String, description = "Unique request identifier"))),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse)
    ),
    security(("gateway_auth" = [])),
    tag = "Service Catalog"
)]
pub async fn create_service(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<CreateServiceDefinitionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ServiceDefinitionResponse>>), ServiceError> {
    let service = state
        .services
        .catalog
        .create_service(&principal, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(service))))
}

/// List service definitions
#[utoipa::path(
    get,
    path = "/api/v1/services",
    params(PaginationParams, ServiceCatalogFilter),
    responses(
        (status = 200, description = "Service definitions, alphabetical", body = crate::ApiResponse<crate::services::catalog::ServiceDefinitionListResponse>,
            headers(("X-Request-Id" = String, description = "Unique request identifier"))),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("gateway_auth" = [])),
    tag = "Service Catalog"
)]
pub async fn list_services(
    State(state): State<AppState>,
    _principal: Principal,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<ServiceCatalogFilter>,
) -> Result<Json<ApiResponse<ServiceDefinitionListResponse>>, ServiceError> {
    let services = state
        .services
        .catalog
        .list_services(
            filter.category,
            filter.include_inactive,
            pagination.page,
            pagination.per_page,
        )
        .await?;
    Ok(Json(ApiResponse::success(services)))
}

/// Get a service definition by ID
#[utoipa::path(
    get,
    path = "/api/v1/services/:id",
    params(
        ("id" = Uuid, Path, description = "Service definition ID")
    ),
    responses(
        (status = 200, description = "Service definition", body = crate::ApiResponse<crate::services::catalog::ServiceDefinitionResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("gateway_auth" = [])),
    tag = "Service Catalog"
)]
pub async fn get_service(
    State(state): State<AppState>,
    _principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ServiceDefinitionResponse>>, ServiceError> {
    let service = state.services.catalog.get_service(id).await?;
    Ok(Json(ApiResponse::success(service)))
}

/// Update a service definition
#[utoipa::path(
    put,
    path = "/api/v1/services/:id",
    params(
        ("id" = Uuid, Path, description = "Service definition ID")
    ),
    request_body = UpdateServiceDefinitionRequest,
    responses(
        (status = 200, description = "Service definition updated", body = crate::ApiResponse<crate::services::catalog::ServiceDefinitionResponse>,
            headers(("X-Request-Id" = String, description = "Unique request identifier"))),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent modification", body = crate::errors::ErrorResponse)
    ),
    security(("gateway_auth" = [])),
    tag = "Service Catalog"
)]
pub async fn update_service(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateServiceDefinitionRequest>,
) -> Result<Json<ApiResponse<ServiceDefinitionResponse>>, ServiceError> {
    let service = state
        .services
        .catalog
        .update_service(&principal, id, request)
        .await?;
    Ok(Json(ApiResponse::success(service)))
}

/// Delete a service definition
#[utoipa::path(
    delete,
    path = "/api/v1/services/:id",
    params(
        ("id" = Uuid, Path, description = "Service definition ID")
    ),
    responses(
        (status = 204, description = "Service definition deleted"),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Referenced by open orders", body = crate::errors::ErrorResponse)
    ),
    security(("gateway_auth" = [])),
    tag = "Service Catalog"
)]
pub async fn delete_service(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.catalog.delete_service(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Service catalog routes
pub fn service_catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_service))
        .route("/", get(list_services))
        .route("/:id", get(get_service))
        .route("/:id", put(update_service))
        .route("/:id", delete(delete_service))
}
