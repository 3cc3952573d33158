use crate::{
    config::AppConfig,
    db::DbPool,
    entities::time_slot::{self, Entity as TimeSlot, Model as TimeSlotModel},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// The shop's slot layout: which labels exist on any bookable day and how
/// many reservations each (date, label) bucket holds. One shared capacity
/// pool per bucket; per-mechanic double-booking is checked separately by
/// the order service.
#[derive(Debug, Clone)]
pub struct SlotPlan {
    pub labels: Vec<String>,
    pub capacity: i32,
}

impl SlotPlan {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            labels: config.slot_labels.clone(),
            capacity: config.slot_capacity,
        }
    }

    pub fn contains(&self, slot_label: &str) -> bool {
        self.labels.iter().any(|label| label == slot_label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SlotAvailability {
    pub slot_label: String,
    pub available_slots: i32,
    pub total_slots: i32,
}

/// Time-slot scheduler over the `time_slots` table. Rows are materialized
/// lazily per date from the configured plan; `reserved_count` is only ever
/// changed through the guarded single-statement updates below, so the
/// `0 <= reserved_count <= total_capacity` invariant holds under any
/// interleaving without row locks.
#[derive(Clone)]
pub struct SchedulerService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    plan: SlotPlan,
}

impl SchedulerService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>, plan: SlotPlan) -> Self {
        Self {
            db_pool,
            event_sender,
            plan,
        }
    }

    pub fn plan(&self) -> &SlotPlan {
        &self.plan
    }

    /// Availability for one calendar day, in plan order. Past dates are
    /// rejected; today counts as bookable.
    #[instrument(skip(self))]
    pub async fn get_availability(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<SlotAvailability>, ServiceError> {
        self.reject_past_date(date)?;
        self.ensure_day(date).await?;

        let db = &*self.db_pool;

        let rows = TimeSlot::find()
            .filter(time_slot::Column::SlotDate.eq(date))
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let mut by_label: HashMap<String, TimeSlotModel> =
            rows.into_iter().map(|row| (row.slot_label.clone(), row)).collect();

        let slots = self
            .plan
            .labels
            .iter()
            .filter_map(|label| match by_label.remove(label) {
                Some(row) => Some(SlotAvailability {
                    slot_label: row.slot_label,
                    available_slots: row.total_capacity - row.reserved_count,
                    total_slots: row.total_capacity,
                }),
                None => {
                    warn!(%date, slot_label = %label, "Slot bucket missing after day materialization");
                    None
                }
            })
            .collect();

        Ok(slots)
    }

    /// Takes one unit of capacity in the given bucket. The check and the
    /// increment are a single UPDATE guarded by
    /// `reserved_count < total_capacity`; zero rows affected means the
    /// bucket was already full.
    #[instrument(skip(self))]
    pub async fn reserve(&self, date: NaiveDate, slot_label: &str) -> Result<(), ServiceError> {
        self.reject_past_date(date)?;
        self.reject_unknown_label(slot_label)?;
        self.ensure_day(date).await?;

        let db = &*self.db_pool;

        let result = TimeSlot::update_many()
            .col_expr(
                time_slot::Column::ReservedCount,
                Expr::col(time_slot::Column::ReservedCount).add(1),
            )
            .col_expr(time_slot::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(time_slot::Column::SlotDate.eq(date))
            .filter(time_slot::Column::SlotLabel.eq(slot_label))
            .filter(
                Expr::col(time_slot::Column::ReservedCount)
                    .lt(Expr::col(time_slot::Column::TotalCapacity)),
            )
            .exec(db)
            .await
            .map_err(|e| {
                error!(error = %e, %date, slot_label, "Failed to reserve slot");
                ServiceError::DatabaseError(e)
            })?;

        if result.rows_affected == 0 {
            info!(%date, slot_label, "Slot is fully booked");
            return Err(ServiceError::SlotFull(format!(
                "Slot {} on {} is fully booked",
                slot_label, date
            )));
        }

        info!(%date, slot_label, "Slot reserved");

        if let Some(event_sender) = &self.event_sender {
            let event = Event::SlotReserved {
                slot_date: date,
                slot_label: slot_label.to_string(),
            };
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, %date, slot_label, "Failed to send slot reserved event");
            }
        }

        Ok(())
    }

    /// Returns one unit of capacity. Used on cancellation and as the
    /// compensating action when a booking fails after reserving, so it
    /// accepts any date or label and treats an already-empty bucket as a
    /// no-op rather than an error.
    #[instrument(skip(self))]
    pub async fn release(&self, date: NaiveDate, slot_label: &str) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let result = TimeSlot::update_many()
            .col_expr(
                time_slot::Column::ReservedCount,
                Expr::col(time_slot::Column::ReservedCount).sub(1),
            )
            .col_expr(time_slot::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(time_slot::Column::SlotDate.eq(date))
            .filter(time_slot::Column::SlotLabel.eq(slot_label))
            .filter(Expr::col(time_slot::Column::ReservedCount).gt(0))
            .exec(db)
            .await
            .map_err(|e| {
                error!(error = %e, %date, slot_label, "Failed to release slot");
                ServiceError::DatabaseError(e)
            })?;

        if result.rows_affected == 0 {
            warn!(%date, slot_label, "Release on empty or unknown slot bucket ignored");
            return Ok(());
        }

        info!(%date, slot_label, "Slot released");

        if let Some(event_sender) = &self.event_sender {
            let event = Event::SlotReleased {
                slot_date: date,
                slot_label: slot_label.to_string(),
            };
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, %date, slot_label, "Failed to send slot released event");
            }
        }

        Ok(())
    }

    /// Materializes the day's buckets from the plan. Insert-or-ignore
    /// against the unique (slot_date, slot_label) index, so concurrent
    /// callers and repeated calls are harmless.
    async fn ensure_day(&self, date: NaiveDate) -> Result<(), ServiceError> {
        if self.plan.labels.is_empty() {
            return Ok(());
        }

        let db = &*self.db_pool;
        let now = Utc::now();

        let rows: Vec<time_slot::ActiveModel> = self
            .plan
            .labels
            .iter()
            .map(|label| time_slot::ActiveModel {
                id: Set(Uuid::new_v4()),
                slot_date: Set(date),
                slot_label: Set(label.clone()),
                total_capacity: Set(self.plan.capacity),
                reserved_count: Set(0),
                created_at: Set(now),
                updated_at: Set(None),
            })
            .collect();

        TimeSlot::insert_many(rows)
            .on_conflict(
                OnConflict::columns([time_slot::Column::SlotDate, time_slot::Column::SlotLabel])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await
            .map_err(|e| {
                error!(error = %e, %date, "Failed to materialize slot buckets");
                ServiceError::DatabaseError(e)
            })?;

        Ok(())
    }

    fn reject_past_date(&self, date: NaiveDate) -> Result<(), ServiceError> {
        let today = Utc::now().date_naive();
        if date < today {
            return Err(ServiceError::InvalidSlot(format!(
                "Date {} is in the past",
                date
            )));
        }
        Ok(())
    }

    fn reject_unknown_label(&self, slot_label: &str) -> Result<(), ServiceError> {
        if !self.plan.contains(slot_label) {
            return Err(ServiceError::InvalidSlot(format!(
                "Unknown slot label '{}'",
                slot_label
            )));
        }
        Ok(())
    }
}
