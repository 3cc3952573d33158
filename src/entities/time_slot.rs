use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The `time_slots` table: one row per (date, slot label) pair, created
/// lazily from the configured slot plan on first touch. Invariant:
/// `0 <= reserved_count <= total_capacity`, enforced by single-statement
/// guarded updates in the scheduler, never by read-then-write.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "time_slots")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub slot_date: Date,
    pub slot_label: String,
    pub total_capacity: i32,
    pub reserved_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
