use crate::{
    auth::Principal,
    db::DbPool,
    entities::order::{self, OrderStatus},
    entities::order_service_line::{self, Entity as OrderServiceLine},
    entities::service_definition::{
        self, Entity as ServiceDefinition, Model as ServiceDefinitionModel, ServiceCategory,
    },
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Hard cap on catalog page sizes, applied after the handler-level default.
const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateServiceDefinitionRequest {
    #[validate(length(
        min = 1,
        max = 120,
        message = "Service name must be between 1 and 120 characters"
    ))]
    pub name: String,
    pub category: ServiceCategory,
    #[validate(length(max = 64, message = "Sub-category must be at most 64 characters"))]
    pub sub_category: Option<String>,
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
    #[validate(custom = "validate_price")]
    pub price: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateServiceDefinitionRequest {
    #[validate(length(
        min = 1,
        max = 120,
        message = "Service name must be between 1 and 120 characters"
    ))]
    pub name: Option<String>,
    pub category: Option<ServiceCategory>,
    #[validate(length(max = 64, message = "Sub-category must be at most 64 characters"))]
    pub sub_category: Option<String>,
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
    #[validate(custom = "validate_price")]
    pub price: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceDefinitionResponse {
    pub id: Uuid,
    pub name: String,
    pub category: ServiceCategory,
    pub sub_category: Option<String>,
    pub description: Option<String>,
    pub price: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ServiceDefinitionListResponse {
    pub services: Vec<ServiceDefinitionResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

fn validate_price(price: &Decimal) -> Result<(), validator::ValidationError> {
    if price.is_sign_negative() {
        return Err(validator::ValidationError::new(
            "Price must not be negative",
        ));
    }
    Ok(())
}

/// Service catalog: the reference data every order books against. Order
/// lines copy name, category, and price at booking time, so catalog edits
/// and deletions never rewrite history.
#[derive(Clone)]
pub struct CatalogService {
    db_pool: Arc<DbPool>,
}

impl CatalogService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, request), fields(name = %request.name, category = %request.category))]
    pub async fn create_service(
        &self,
        principal: &Principal,
        request: CreateServiceDefinitionRequest,
    ) -> Result<ServiceDefinitionResponse, ServiceError> {
        principal.require_admin()?;
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;
        let now = Utc::now();
        let service_id = Uuid::new_v4();

        let service = service_definition::ActiveModel {
            id: Set(service_id),
            name: Set(request.name),
            category: Set(request.category),
            sub_category: Set(request.sub_category),
            description: Set(request.description),
            price: Set(request.price.round_dp(2)),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(None),
            version: Set(1),
        };

        let saved = service.insert(db).await.map_err(|e| {
            error!(error = %e, "Failed to create service definition");
            ServiceError::DatabaseError(e)
        })?;

        info!(service_id = %service_id, "Service definition created successfully");

        Ok(self.model_to_response(saved))
    }

    #[instrument(skip(self))]
    pub async fn get_service(
        &self,
        service_id: Uuid,
    ) -> Result<ServiceDefinitionResponse, ServiceError> {
        let db = &*self.db_pool;

        let service = ServiceDefinition::find_by_id(service_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                warn!(service_id = %service_id, "Service definition not found");
                ServiceError::NotFound(format!("Service definition {} not found", service_id))
            })?;

        Ok(self.model_to_response(service))
    }

    #[instrument(skip(self))]
    pub async fn list_services(
        &self,
        category: Option<ServiceCategory>,
        include_inactive: bool,
        page: u64,
        per_page: u64,
    ) -> Result<ServiceDefinitionListResponse, ServiceError> {
        let db = &*self.db_pool;
        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PAGE_SIZE);

        let mut query = ServiceDefinition::find();
        if let Some(category) = category {
            query = query.filter(service_definition::Column::Category.eq(category));
        }
        if !include_inactive {
            query = query.filter(service_definition::Column::IsActive.eq(true));
        }

        let paginator = query
            .order_by_asc(service_definition::Column::Name)
            .paginate(db, per_page);

        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let services = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(ServiceDefinitionListResponse {
            services: services
                .into_iter()
                .map(|s| self.model_to_response(s))
                .collect(),
            total,
            page,
            per_page,
        })
    }

    #[instrument(skip(self, request))]
    pub async fn update_service(
        &self,
        principal: &Principal,
        service_id: Uuid,
        request: UpdateServiceDefinitionRequest,
    ) -> Result<ServiceDefinitionResponse, ServiceError> {
        principal.require_admin()?;
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;

        let service = ServiceDefinition::find_by_id(service_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                warn!(service_id = %service_id, "Service definition not found for update");
                ServiceError::NotFound(format!("Service definition {} not found", service_id))
            })?;

        let current_version = service.version;
        let now = Utc::now();

        let mut changes = service_definition::ActiveModel {
            updated_at: Set(Some(now)),
            version: Set(current_version + 1),
            ..Default::default()
        };
        if let Some(name) = request.name {
            changes.name = Set(name);
        }
        if let Some(category) = request.category {
            changes.category = Set(category);
        }
        if let Some(sub_category) = request.sub_category {
            changes.sub_category = Set(Some(sub_category));
        }
        if let Some(description) = request.description {
            changes.description = Set(Some(description));
        }
        if let Some(price) = request.price {
            changes.price = Set(price.round_dp(2));
        }
        if let Some(is_active) = request.is_active {
            changes.is_active = Set(is_active);
        }

        let result = ServiceDefinition::update_many()
            .set(changes)
            .filter(service_definition::Column::Id.eq(service_id))
            .filter(service_definition::Column::Version.eq(current_version))
            .exec(db)
            .await
            .map_err(|e| {
                error!(error = %e, service_id = %service_id, "Failed to update service definition");
                ServiceError::DatabaseError(e)
            })?;

        if result.rows_affected == 0 {
            warn!(service_id = %service_id, "Service definition changed concurrently");
            return Err(ServiceError::ConcurrentModification(service_id));
        }

        info!(service_id = %service_id, "Service definition updated successfully");

        self.get_service(service_id).await
    }

    /// Deletes a catalog entry. Rejected while any open order still holds a
    /// line referencing it; lines on completed or cancelled orders carry
    /// their own snapshot columns and do not block deletion.
    #[instrument(skip(self))]
    pub async fn delete_service(
        &self,
        principal: &Principal,
        service_id: Uuid,
    ) -> Result<(), ServiceError> {
        principal.require_admin()?;

        let db = &*self.db_pool;

        ServiceDefinition::find_by_id(service_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                warn!(service_id = %service_id, "Service definition not found for deletion");
                ServiceError::NotFound(format!("Service definition {} not found", service_id))
            })?;

        let open_references = OrderServiceLine::find()
            .filter(order_service_line::Column::ServiceId.eq(service_id))
            .inner_join(order::Entity)
            .filter(order::Column::Status.is_in([OrderStatus::Pending, OrderStatus::InProgress]))
            .count(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if open_references > 0 {
            warn!(
                service_id = %service_id,
                open_references,
                "Refusing to delete service definition referenced by open orders"
            );
            return Err(ServiceError::ReferentialConflict(format!(
                "Service definition {} is referenced by {} open order(s)",
                service_id, open_references
            )));
        }

        ServiceDefinition::delete_by_id(service_id)
            .exec(db)
            .await
            .map_err(|e| {
                error!(error = %e, service_id = %service_id, "Failed to delete service definition");
                ServiceError::DatabaseError(e)
            })?;

        info!(service_id = %service_id, "Service definition deleted successfully");

        Ok(())
    }

    fn model_to_response(&self, model: ServiceDefinitionModel) -> ServiceDefinitionResponse {
        ServiceDefinitionResponse {
            id: model.id,
            name: model.name,
            category: model.category,
            sub_category: model.sub_category,
            description: model.description,
            price: model.price,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
            version: model.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sea_orm::DatabaseConnection;

    fn service() -> CatalogService {
        CatalogService::new(Arc::new(DatabaseConnection::Disconnected))
    }

    #[test]
    fn model_to_response_copies_all_fields() {
        let now = Utc::now();
        let model = ServiceDefinitionModel {
            id: Uuid::new_v4(),
            name: "Brake pad replacement".to_string(),
            category: ServiceCategory::Repair,
            sub_category: None,
            description: Some("Front axle".to_string()),
            price: dec!(250.00),
            is_active: true,
            created_at: now,
            updated_at: None,
            version: 1,
        };

        let response = service().model_to_response(model.clone());

        assert_eq!(response.id, model.id);
        assert_eq!(response.name, "Brake pad replacement");
        assert_eq!(response.price, dec!(250.00));
        assert!(response.is_active);
        assert_eq!(response.version, 1);
    }

    #[test]
    fn create_request_rejects_negative_price() {
        let request = CreateServiceDefinitionRequest {
            name: "Oil change".to_string(),
            category: ServiceCategory::Maintenance,
            sub_category: None,
            description: None,
            price: dec!(-1.00),
        };

        assert!(request.validate().is_err());
    }

    #[test]
    fn create_request_rejects_empty_name() {
        let request = CreateServiceDefinitionRequest {
            name: String::new(),
            category: ServiceCategory::Repair,
            sub_category: None,
            description: None,
            price: dec!(100.00),
        };

        assert!(request.validate().is_err());
    }

    #[test]
    fn update_request_allows_partial_payloads() {
        let request = UpdateServiceDefinitionRequest {
            name: None,
            category: None,
            sub_category: None,
            description: None,
            price: Some(dec!(99.99)),
            is_active: None,
        };

        assert!(request.validate().is_ok());
    }
}
