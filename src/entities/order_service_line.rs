use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

use super::service_definition::ServiceCategory;

/// Role a snapshot line plays on its order. Replaces the category-string
/// comparisons of the legacy surface with exhaustive matching.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, Display,
    EnumString, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ServiceLineKind {
    #[sea_orm(string_value = "primary")]
    Primary,
    #[sea_orm(string_value = "inspection")]
    Inspection,
    #[sea_orm(string_value = "additional")]
    Additional,
}

/// The `order_service_lines` table: per-order snapshots of catalog
/// definitions. `service_id` is an advisory reference only (duplicate and
/// referential-conflict checks); the billing data is the copied columns,
/// which must survive later catalog edits or deletions.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_service_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub order_id: Uuid,
    pub service_id: Uuid,
    pub line_kind: ServiceLineKind,
    pub service_name: String,
    pub category: ServiceCategory,
    pub sub_category: Option<String>,
    pub unit_price: Decimal,
    pub notes: Option<String>,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::service_definition::Entity",
        from = "Column::ServiceId",
        to = "super::service_definition::Column::Id"
    )]
    ServiceDefinition,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::service_definition::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ServiceDefinition.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
