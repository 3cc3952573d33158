use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Category of a catalog service. Inspection-category definitions carry a
/// free-form sub-category (e.g. "EngineInspection").
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, Display,
    EnumString, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ServiceCategory {
    #[sea_orm(string_value = "repair")]
    Repair,
    #[sea_orm(string_value = "maintenance")]
    Maintenance,
    #[sea_orm(string_value = "inspection")]
    Inspection,
}

/// The `service_definitions` table: catalog reference data consumed by
/// every order. Order lines snapshot these rows at booking time, so edits
/// here only affect future orders.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "service_definitions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(
        min = 1,
        max = 120,
        message = "Service name must be between 1 and 120 characters"
    ))]
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

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_service_line::Entity")]
    OrderServiceLine,
}

impl Related<super::order_service_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderServiceLine.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
