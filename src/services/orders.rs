use crate::{
    auth::Principal,
    db::DbPool,
    entities::appointment::{self, AppointmentStatus, Entity as Appointment, Model as AppointmentModel},
    entities::inspection::{self, Entity as Inspection, InspectionStatus, Model as InspectionModel},
    entities::order::{self, Entity as Order, Model as OrderModel, OrderStatus, PaymentMethod},
    entities::order_service_line::{
        self, Entity as OrderServiceLine, Model as ServiceLineModel, ServiceLineKind,
    },
    entities::service_definition::{
        Entity as ServiceDefinition, Model as ServiceDefinitionModel, ServiceCategory,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::scheduler::SchedulerService,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

const MAX_PAGE_SIZE: u64 = 100;

/// Legality table for order status moves: the only paths are
/// pending to in_progress to completed, with cancellation possible until a
/// terminal state is reached. Terminal states allow nothing.
pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
    match from {
        OrderStatus::Pending => matches!(to, OrderStatus::InProgress | OrderStatus::Cancelled),
        OrderStatus::InProgress => matches!(to, OrderStatus::Completed | OrderStatus::Cancelled),
        OrderStatus::Completed | OrderStatus::Cancelled => false,
    }
}

/// Inspections move forward only (pending to in_progress to completed,
/// skipping allowed) or get cancelled before reaching a terminal state.
pub fn is_valid_inspection_transition(from: InspectionStatus, to: InspectionStatus) -> bool {
    match from {
        InspectionStatus::Pending => matches!(
            to,
            InspectionStatus::InProgress | InspectionStatus::Completed | InspectionStatus::Cancelled
        ),
        InspectionStatus::InProgress => {
            matches!(to, InspectionStatus::Completed | InspectionStatus::Cancelled)
        }
        InspectionStatus::Completed | InspectionStatus::Cancelled => false,
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    pub vehicle_id: Uuid,
    /// Omitted by customer callers; required for staff booking on behalf of
    /// a customer.
    pub customer_id: Option<Uuid>,
    /// Primary engagement from the catalog (repair or maintenance).
    pub service_id: Option<Uuid>,
    /// Inspection-category catalog entry; booking it requires `date` and
    /// `time_slot`.
    pub inspection_type_id: Option<Uuid>,
    #[validate(length(max = 64, message = "Sub-category must be at most 64 characters"))]
    pub inspection_sub_category: Option<String>,
    pub date: Option<NaiveDate>,
    pub time_slot: Option<String>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub additional_service_ids: Vec<Uuid>,
    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct AssignMechanicRequest {
    pub mechanic_id: Uuid,
    pub appointment_date: NaiveDate,
    #[validate(length(min = 1, message = "Time slot is required"))]
    pub time_slot: String,
    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct AddServiceRequest {
    pub service_id: Uuid,
    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateInspectionRequest {
    pub status: Option<InspectionStatus>,
    pub body_condition: Option<String>,
    pub engine_condition: Option<String>,
    pub electrical_condition: Option<String>,
    pub tire_condition: Option<String>,
    pub brake_condition: Option<String>,
    pub transmission_condition: Option<String>,
    pub interior_condition: Option<String>,
    pub suspension_condition: Option<String>,
    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub vehicle_id: Uuid,
    pub status: OrderStatus,
    pub includes_inspection: bool,
    pub payment_method: PaymentMethod,
    pub total_amount: Decimal,
    pub invoice_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceLineResponse {
    pub id: Uuid,
    pub service_id: Uuid,
    pub line_kind: ServiceLineKind,
    pub service_name: String,
    pub category: ServiceCategory,
    pub sub_category: Option<String>,
    pub unit_price: Decimal,
    pub notes: Option<String>,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InspectionResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub status: InspectionStatus,
    pub sub_category: Option<String>,
    pub scheduled_date: NaiveDate,
    pub time_slot: String,
    pub price: Decimal,
    pub body_condition: Option<String>,
    pub engine_condition: Option<String>,
    pub electrical_condition: Option<String>,
    pub tire_condition: Option<String>,
    pub brake_condition: Option<String>,
    pub transmission_condition: Option<String>,
    pub interior_condition: Option<String>,
    pub suspension_condition: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AppointmentResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub mechanic_id: Uuid,
    pub appointment_date: NaiveDate,
    pub time_slot: String,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderDetailsResponse {
    pub order: OrderResponse,
    pub service_lines: Vec<ServiceLineResponse>,
    pub inspection: Option<InspectionResponse>,
    pub appointment: Option<AppointmentResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

fn generate_order_number(now: &DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "RO-{}-{}",
        now.format("%Y%m%d"),
        suffix[..8].to_uppercase()
    )
}

/// Order lifecycle state machine. Owns the order aggregate (order row,
/// snapshot service lines, inspection, appointment), enforces the status
/// legality table, and keeps `total_amount` equal to the sum of line
/// prices after every mutation. Slot capacity is delegated to the
/// scheduler; reservations taken during an operation are released again if
/// the operation fails afterwards.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    scheduler: SchedulerService,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        scheduler: SchedulerService,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            scheduler,
        }
    }

    #[instrument(skip(self, request), fields(vehicle_id = %request.vehicle_id))]
    pub async fn create_order(
        &self,
        principal: &Principal,
        request: CreateOrderRequest,
    ) -> Result<OrderDetailsResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        if request.service_id.is_none() && request.inspection_type_id.is_none() {
            return Err(ServiceError::ValidationError(
                "At least one of service_id or inspection_type_id is required".to_string(),
            ));
        }

        let inspection_booking = match request.inspection_type_id {
            Some(inspection_type_id) => match (request.date, request.time_slot.as_deref()) {
                (Some(date), Some(slot)) => Some((inspection_type_id, date, slot.to_string())),
                _ => {
                    return Err(ServiceError::ValidationError(
                        "Booking an inspection requires date and time_slot".to_string(),
                    ))
                }
            },
            None => None,
        };

        let mut seen = HashSet::new();
        let requested_ids = request
            .service_id
            .iter()
            .chain(request.inspection_type_id.iter())
            .chain(request.additional_service_ids.iter());
        for service_id in requested_ids {
            if !seen.insert(*service_id) {
                return Err(ServiceError::DuplicateService(format!(
                    "Service {} is requested more than once",
                    service_id
                )));
            }
        }

        let customer_id = resolve_customer(principal, request.customer_id)?;

        let db = &*self.db_pool;

        let primary_def = match request.service_id {
            Some(service_id) => {
                let def = self.load_bookable_definition(service_id).await?;
                if def.category == ServiceCategory::Inspection {
                    return Err(ServiceError::ValidationError(format!(
                        "Service {} is an inspection type and cannot be the primary service",
                        service_id
                    )));
                }
                Some(def)
            }
            None => None,
        };

        let inspection_def = match &inspection_booking {
            Some((inspection_type_id, _, _)) => {
                let def = self.load_bookable_definition(*inspection_type_id).await?;
                if def.category != ServiceCategory::Inspection {
                    return Err(ServiceError::ValidationError(format!(
                        "Service {} is not an inspection type",
                        inspection_type_id
                    )));
                }
                Some(def)
            }
            None => None,
        };

        let mut additional_defs = Vec::with_capacity(request.additional_service_ids.len());
        for service_id in &request.additional_service_ids {
            additional_defs.push(self.load_bookable_definition(*service_id).await?);
        }

        // Capacity is taken before the order is persisted; if persistence
        // fails the reservation is handed back below.
        if let Some((_, date, slot)) = &inspection_booking {
            self.scheduler.reserve(*date, slot).await?;
        }

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order_number = generate_order_number(&now);

        let persisted: Result<(OrderModel, Vec<ServiceLineModel>, Option<InspectionModel>), ServiceError> = async {
            let txn = db.begin().await.map_err(|e| {
                error!(error = %e, "Failed to start transaction for order creation");
                ServiceError::DatabaseError(e)
            })?;

            let mut position: i32 = 0;
            let mut total_amount = Decimal::ZERO;
            let mut line_models = Vec::new();

            if let Some(def) = &primary_def {
                total_amount += def.price;
                let line = snapshot_line(order_id, def, ServiceLineKind::Primary, position, now);
                line_models.push(line.insert(&txn).await.map_err(|e| {
                    error!(error = %e, order_id = %order_id, "Failed to insert primary service line");
                    ServiceError::DatabaseError(e)
                })?);
                position += 1;
            }

            let mut inspection_model = None;
            if let (Some(def), Some((_, date, slot))) = (&inspection_def, &inspection_booking) {
                total_amount += def.price;
                let sub_category = request
                    .inspection_sub_category
                    .clone()
                    .or_else(|| def.sub_category.clone());

                let mut line = snapshot_line(order_id, def, ServiceLineKind::Inspection, position, now);
                line.sub_category = Set(sub_category.clone());
                line_models.push(line.insert(&txn).await.map_err(|e| {
                    error!(error = %e, order_id = %order_id, "Failed to insert inspection line");
                    ServiceError::DatabaseError(e)
                })?);
                position += 1;

                let inspection = inspection::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    order_id: Set(order_id),
                    status: Set(InspectionStatus::Pending),
                    sub_category: Set(sub_category),
                    scheduled_date: Set(*date),
                    time_slot: Set(slot.clone()),
                    price: Set(def.price),
                    body_condition: Set(None),
                    engine_condition: Set(None),
                    electrical_condition: Set(None),
                    tire_condition: Set(None),
                    brake_condition: Set(None),
                    transmission_condition: Set(None),
                    interior_condition: Set(None),
                    suspension_condition: Set(None),
                    notes: Set(None),
                    created_at: Set(now),
                    updated_at: Set(None),
                    version: Set(1),
                };
                inspection_model = Some(inspection.insert(&txn).await.map_err(|e| {
                    error!(error = %e, order_id = %order_id, "Failed to insert inspection");
                    ServiceError::DatabaseError(e)
                })?);
            }

            for def in &additional_defs {
                total_amount += def.price;
                let line = snapshot_line(order_id, def, ServiceLineKind::Additional, position, now);
                line_models.push(line.insert(&txn).await.map_err(|e| {
                    error!(error = %e, order_id = %order_id, "Failed to insert additional service line");
                    ServiceError::DatabaseError(e)
                })?);
                position += 1;
            }

            let order = order::ActiveModel {
                id: Set(order_id),
                order_number: Set(order_number.clone()),
                customer_id: Set(customer_id),
                vehicle_id: Set(request.vehicle_id),
                status: Set(OrderStatus::Pending),
                includes_inspection: Set(inspection_def.is_some()),
                payment_method: Set(request.payment_method),
                total_amount: Set(total_amount),
                invoice_id: Set(None),
                notes: Set(request.notes.clone()),
                created_at: Set(now),
                updated_at: Set(None),
                version: Set(1),
            };
            let order_model = order.insert(&txn).await.map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to insert order");
                ServiceError::DatabaseError(e)
            })?;

            txn.commit().await.map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to commit order creation");
                ServiceError::DatabaseError(e)
            })?;

            Ok((order_model, line_models, inspection_model))
        }
        .await;

        let (order_model, line_models, inspection_model) = match persisted {
            Ok(models) => models,
            Err(e) => {
                if let Some((_, date, slot)) = &inspection_booking {
                    if let Err(release_err) = self.scheduler.release(*date, slot).await {
                        error!(
                            error = %release_err,
                            order_id = %order_id,
                            "Failed to release slot after order creation failure"
                        );
                    }
                }
                return Err(e);
            }
        };

        info!(
            order_id = %order_id,
            order_number = %order_number,
            total_amount = %order_model.total_amount,
            "Order created successfully"
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::OrderCreated(order_id)).await {
                warn!(error = %e, order_id = %order_id, "Failed to send order created event");
            }
        }

        Ok(OrderDetailsResponse {
            order: self.model_to_response(order_model),
            service_lines: line_models
                .into_iter()
                .map(|line| self.line_to_response(line))
                .collect(),
            inspection: inspection_model.map(|model| self.inspection_to_response(model)),
            appointment: None,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        principal: &Principal,
        order_id: Uuid,
    ) -> Result<OrderDetailsResponse, ServiceError> {
        let order = self.load_order(order_id).await?;
        authorize_order_access(principal, &order)?;
        self.load_details(order).await
    }

    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        principal: &Principal,
        status: Option<OrderStatus>,
        customer_id: Option<Uuid>,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        principal.require_staff()?;

        let db = &*self.db_pool;
        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PAGE_SIZE);

        let mut query = Order::find();
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }
        if let Some(customer_id) = customer_id {
            query = query.filter(order::Column::CustomerId.eq(customer_id));
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(db, per_page);

        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let orders = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(OrderListResponse {
            orders: orders
                .into_iter()
                .map(|order| self.model_to_response(order))
                .collect(),
            total,
            page,
            per_page,
        })
    }

    /// Books a mechanic visit for the order. The mechanic must be free in
    /// the requested bucket (any non-cancelled appointment in the same
    /// date and slot blocks), and the visit consumes one unit of shop
    /// capacity on top of the per-mechanic check.
    #[instrument(skip(self, request), fields(mechanic_id = %request.mechanic_id))]
    pub async fn assign_mechanic(
        &self,
        principal: &Principal,
        order_id: Uuid,
        request: AssignMechanicRequest,
    ) -> Result<AppointmentResponse, ServiceError> {
        principal.require_staff()?;
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;

        let order = self.load_order(order_id).await?;
        if order.status.is_terminal() {
            return Err(ServiceError::IllegalTransition(format!(
                "Cannot assign a mechanic to a {} order",
                order.status
            )));
        }

        let existing = Appointment::find()
            .filter(appointment::Column::OrderId.eq(order_id))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if existing.is_some() {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} already has an assigned mechanic",
                order_id
            )));
        }

        let conflicts = Appointment::find()
            .filter(appointment::Column::MechanicId.eq(request.mechanic_id))
            .filter(appointment::Column::AppointmentDate.eq(request.appointment_date))
            .filter(appointment::Column::TimeSlot.eq(request.time_slot.clone()))
            .filter(appointment::Column::Status.ne(AppointmentStatus::Cancelled))
            .count(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if conflicts > 0 {
            info!(
                order_id = %order_id,
                mechanic_id = %request.mechanic_id,
                date = %request.appointment_date,
                slot = %request.time_slot,
                "Mechanic already booked in this slot"
            );
            return Err(ServiceError::NoMechanicAvailable(format!(
                "Mechanic {} is already booked on {} at {}",
                request.mechanic_id, request.appointment_date, request.time_slot
            )));
        }

        self.scheduler
            .reserve(request.appointment_date, &request.time_slot)
            .await?;

        let now = Utc::now();
        let appointment_id = Uuid::new_v4();
        let was_pending = order.status == OrderStatus::Pending;

        let persisted: Result<AppointmentModel, ServiceError> = async {
            let txn = db.begin().await.map_err(|e| {
                error!(error = %e, "Failed to start transaction for mechanic assignment");
                ServiceError::DatabaseError(e)
            })?;

            let appointment = appointment::ActiveModel {
                id: Set(appointment_id),
                order_id: Set(order_id),
                mechanic_id: Set(request.mechanic_id),
                appointment_date: Set(request.appointment_date),
                time_slot: Set(request.time_slot.clone()),
                status: Set(AppointmentStatus::Scheduled),
                notes: Set(request.notes.clone()),
                created_at: Set(now),
                updated_at: Set(None),
                version: Set(1),
            };
            let appointment_model = appointment.insert(&txn).await.map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to insert appointment");
                ServiceError::DatabaseError(e)
            })?;

            if was_pending {
                update_order_status_guarded(&txn, &order, OrderStatus::InProgress, now).await?;
            }

            txn.commit().await.map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to commit mechanic assignment");
                ServiceError::DatabaseError(e)
            })?;

            Ok(appointment_model)
        }
        .await;

        let appointment_model = match persisted {
            Ok(model) => model,
            Err(e) => {
                if let Err(release_err) = self
                    .scheduler
                    .release(request.appointment_date, &request.time_slot)
                    .await
                {
                    error!(
                        error = %release_err,
                        order_id = %order_id,
                        "Failed to release slot after assignment failure"
                    );
                }
                return Err(e);
            }
        };

        info!(
            order_id = %order_id,
            appointment_id = %appointment_id,
            mechanic_id = %request.mechanic_id,
            "Mechanic assigned successfully"
        );

        if let Some(event_sender) = &self.event_sender {
            let event = Event::MechanicAssigned {
                order_id,
                appointment_id,
                mechanic_id: request.mechanic_id,
            };
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, order_id = %order_id, "Failed to send mechanic assigned event");
            }
            if was_pending {
                let event = Event::OrderStatusChanged {
                    order_id,
                    old_status: OrderStatus::Pending.to_string(),
                    new_status: OrderStatus::InProgress.to_string(),
                };
                if let Err(e) = event_sender.send(event).await {
                    warn!(error = %e, order_id = %order_id, "Failed to send status changed event");
                }
            }
        }

        Ok(self.appointment_to_response(appointment_model))
    }

    /// Appends another catalog service to an open order as a snapshot line
    /// and recomputes the total.
    #[instrument(skip(self, request), fields(service_id = %request.service_id))]
    pub async fn add_service(
        &self,
        principal: &Principal,
        order_id: Uuid,
        request: AddServiceRequest,
    ) -> Result<ServiceLineResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;

        let order = self.load_order(order_id).await?;
        authorize_order_access(principal, &order)?;

        if order.status.is_terminal() {
            return Err(ServiceError::IllegalTransition(format!(
                "Cannot add services to a {} order",
                order.status
            )));
        }

        let lines = self.load_lines(order_id).await?;
        if lines.iter().any(|line| line.service_id == request.service_id) {
            return Err(ServiceError::DuplicateService(format!(
                "Service {} is already on order {}",
                request.service_id, order_id
            )));
        }

        let def = self.load_bookable_definition(request.service_id).await?;

        let now = Utc::now();
        let next_position = lines.iter().map(|line| line.position + 1).max().unwrap_or(0);
        let new_total: Decimal =
            lines.iter().map(|line| line.unit_price).sum::<Decimal>() + def.price;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for adding a service");
            ServiceError::DatabaseError(e)
        })?;

        let mut line = snapshot_line(order_id, &def, ServiceLineKind::Additional, next_position, now);
        line.notes = Set(request.notes.clone());
        let line_model = line.insert(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to insert service line");
            ServiceError::DatabaseError(e)
        })?;

        let changes = order::ActiveModel {
            total_amount: Set(new_total),
            updated_at: Set(Some(now)),
            version: Set(order.version + 1),
            ..Default::default()
        };
        let result = Order::update_many()
            .set(changes)
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Version.eq(order.version))
            .exec(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to update order total");
                ServiceError::DatabaseError(e)
            })?;
        if result.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(order_id));
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit service addition");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            order_id = %order_id,
            service_id = %request.service_id,
            total_amount = %new_total,
            "Service added to order successfully"
        );

        if let Some(event_sender) = &self.event_sender {
            let event = Event::ServiceAddedToOrder {
                order_id,
                service_id: request.service_id,
            };
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, order_id = %order_id, "Failed to send service added event");
            }
        }

        Ok(self.line_to_response(line_model))
    }

    /// Records per-component inspection findings and optionally moves the
    /// inspection status forward.
    #[instrument(skip(self, request))]
    pub async fn record_inspection_results(
        &self,
        principal: &Principal,
        order_id: Uuid,
        request: UpdateInspectionRequest,
    ) -> Result<InspectionResponse, ServiceError> {
        principal.require_staff()?;
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;

        self.load_order(order_id).await?;
        let current = Inspection::find()
            .filter(inspection::Column::OrderId.eq(order_id))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                warn!(order_id = %order_id, "Order has no inspection");
                ServiceError::NotFound(format!("Order {} has no inspection", order_id))
            })?;

        if let Some(new_status) = request.status {
            if !is_valid_inspection_transition(current.status, new_status) {
                return Err(ServiceError::IllegalTransition(format!(
                    "Cannot move inspection from {} to {}",
                    current.status, new_status
                )));
            }
        }

        let now = Utc::now();
        let current_version = current.version;
        let inspection_id = current.id;

        let mut changes = inspection::ActiveModel {
            updated_at: Set(Some(now)),
            version: Set(current_version + 1),
            ..Default::default()
        };
        if let Some(status) = request.status {
            changes.status = Set(status);
        }
        if let Some(value) = request.body_condition {
            changes.body_condition = Set(Some(value));
        }
        if let Some(value) = request.engine_condition {
            changes.engine_condition = Set(Some(value));
        }
        if let Some(value) = request.electrical_condition {
            changes.electrical_condition = Set(Some(value));
        }
        if let Some(value) = request.tire_condition {
            changes.tire_condition = Set(Some(value));
        }
        if let Some(value) = request.brake_condition {
            changes.brake_condition = Set(Some(value));
        }
        if let Some(value) = request.transmission_condition {
            changes.transmission_condition = Set(Some(value));
        }
        if let Some(value) = request.interior_condition {
            changes.interior_condition = Set(Some(value));
        }
        if let Some(value) = request.suspension_condition {
            changes.suspension_condition = Set(Some(value));
        }
        if let Some(value) = request.notes {
            changes.notes = Set(Some(value));
        }

        let result = Inspection::update_many()
            .set(changes)
            .filter(inspection::Column::Id.eq(inspection_id))
            .filter(inspection::Column::Version.eq(current_version))
            .exec(db)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to update inspection");
                ServiceError::DatabaseError(e)
            })?;
        if result.rows_affected == 0 {
            warn!(order_id = %order_id, "Inspection changed concurrently");
            return Err(ServiceError::ConcurrentModification(inspection_id));
        }

        info!(order_id = %order_id, inspection_id = %inspection_id, "Inspection updated successfully");

        if let Some(event_sender) = &self.event_sender {
            let event = Event::InspectionResultsRecorded {
                order_id,
                inspection_id,
            };
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, order_id = %order_id, "Failed to send inspection recorded event");
            }
        }

        let updated = Inspection::find_by_id(inspection_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Order {} has no inspection", order_id))
            })?;

        Ok(self.inspection_to_response(updated))
    }

    /// Promotes a completed inspection into the order's primary engagement.
    /// Only meaningful for inspection-only orders where the mechanic has
    /// finished inspecting and the customer agrees to the follow-up work;
    /// the captured inspection fee becomes the primary line price, so the
    /// order total does not change.
    #[instrument(skip(self))]
    pub async fn transfer_inspection_to_service(
        &self,
        principal: &Principal,
        order_id: Uuid,
    ) -> Result<OrderDetailsResponse, ServiceError> {
        principal.require_staff()?;

        let db = &*self.db_pool;

        let order = self.load_order(order_id).await?;
        if order.status.is_terminal() {
            return Err(ServiceError::IllegalTransition(format!(
                "Cannot transfer the inspection of a {} order",
                order.status
            )));
        }

        let lines = self.load_lines(order_id).await?;
        if lines
            .iter()
            .any(|line| line.line_kind == ServiceLineKind::Primary)
        {
            return Err(ServiceError::IllegalTransition(
                "Order already has a primary service".to_string(),
            ));
        }
        let inspection_line = lines
            .iter()
            .find(|line| line.line_kind == ServiceLineKind::Inspection)
            .cloned()
            .ok_or_else(|| {
                ServiceError::IllegalTransition("Order has no inspection line".to_string())
            })?;

        let inspection_state = Inspection::find()
            .filter(inspection::Column::OrderId.eq(order_id))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::IllegalTransition("Order has no inspection".to_string())
            })?;
        if inspection_state.status != InspectionStatus::Completed {
            return Err(ServiceError::IllegalTransition(format!(
                "Inspection must be completed before transfer, currently {}",
                inspection_state.status
            )));
        }

        let appointment_state = Appointment::find()
            .filter(appointment::Column::OrderId.eq(order_id))
            .filter(appointment::Column::Status.ne(AppointmentStatus::Cancelled))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if appointment_state.is_none() {
            return Err(ServiceError::IllegalTransition(
                "Order has no assigned mechanic".to_string(),
            ));
        }

        let now = Utc::now();
        let service_id = inspection_line.service_id;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for inspection transfer");
            ServiceError::DatabaseError(e)
        })?;

        let mut line: order_service_line::ActiveModel = inspection_line.into();
        line.line_kind = Set(ServiceLineKind::Primary);
        line.update(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to reclassify inspection line");
            ServiceError::DatabaseError(e)
        })?;

        if order.status == OrderStatus::Pending {
            update_order_status_guarded(&txn, &order, OrderStatus::InProgress, now).await?;
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit inspection transfer");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, service_id = %service_id, "Inspection transferred to service");

        if let Some(event_sender) = &self.event_sender {
            let event = Event::InspectionTransferred {
                order_id,
                service_id,
            };
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, order_id = %order_id, "Failed to send inspection transferred event");
            }
        }

        let order = self.load_order(order_id).await?;
        self.load_details(order).await
    }

    /// Explicit status move. Cancellation tears down the order's side
    /// state: the inspection and appointment are cancelled and every slot
    /// reservation the order holds is handed back.
    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        principal: &Principal,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<OrderResponse, ServiceError> {
        principal.require_staff()?;

        let db = &*self.db_pool;

        let order = self.load_order(order_id).await?;
        let old_status = order.status;

        if !is_valid_transition(old_status, new_status) {
            info!(
                order_id = %order_id,
                from = %old_status,
                to = %new_status,
                "Rejected illegal order transition"
            );
            return Err(ServiceError::IllegalTransition(format!(
                "Cannot transition order from {} to {}",
                old_status, new_status
            )));
        }

        let inspection_state = Inspection::find()
            .filter(inspection::Column::OrderId.eq(order_id))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        let appointment_state = Appointment::find()
            .filter(appointment::Column::OrderId.eq(order_id))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let now = Utc::now();
        // Collected inside the transaction, released after commit.
        let mut slots_to_release: Vec<(NaiveDate, String)> = Vec::new();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for status change");
            ServiceError::DatabaseError(e)
        })?;

        update_order_status_guarded(&txn, &order, new_status, now).await?;

        match new_status {
            OrderStatus::Cancelled => {
                if let Some(state) = &inspection_state {
                    if !state.status.is_terminal() {
                        slots_to_release.push((state.scheduled_date, state.time_slot.clone()));
                        let changes = inspection::ActiveModel {
                            status: Set(InspectionStatus::Cancelled),
                            updated_at: Set(Some(now)),
                            version: Set(state.version + 1),
                            ..Default::default()
                        };
                        let result = Inspection::update_many()
                            .set(changes)
                            .filter(inspection::Column::Id.eq(state.id))
                            .filter(inspection::Column::Version.eq(state.version))
                            .exec(&txn)
                            .await
                            .map_err(|e| {
                                error!(error = %e, order_id = %order_id, "Failed to cancel inspection");
                                ServiceError::DatabaseError(e)
                            })?;
                        if result.rows_affected == 0 {
                            return Err(ServiceError::ConcurrentModification(state.id));
                        }
                    }
                }
                if let Some(state) = &appointment_state {
                    if state.status == AppointmentStatus::Scheduled {
                        slots_to_release.push((state.appointment_date, state.time_slot.clone()));
                        update_appointment_status_guarded(
                            &txn,
                            state,
                            AppointmentStatus::Cancelled,
                            now,
                        )
                        .await?;
                    }
                }
            }
            OrderStatus::Completed => {
                if let Some(state) = &appointment_state {
                    if state.status == AppointmentStatus::Scheduled {
                        update_appointment_status_guarded(
                            &txn,
                            state,
                            AppointmentStatus::Completed,
                            now,
                        )
                        .await?;
                    }
                }
            }
            OrderStatus::Pending | OrderStatus::InProgress => {}
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit status change");
            ServiceError::DatabaseError(e)
        })?;

        // The cancellation is already durable; a failed release must not
        // undo it, so it is only logged.
        for (date, slot) in &slots_to_release {
            if let Err(e) = self.scheduler.release(*date, slot).await {
                error!(
                    error = %e,
                    order_id = %order_id,
                    %date,
                    slot,
                    "Failed to release slot for cancelled order"
                );
            }
        }

        info!(
            order_id = %order_id,
            from = %old_status,
            to = %new_status,
            "Order status changed successfully"
        );

        if let Some(event_sender) = &self.event_sender {
            let event = Event::OrderStatusChanged {
                order_id,
                old_status: old_status.to_string(),
                new_status: new_status.to_string(),
            };
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, order_id = %order_id, "Failed to send status changed event");
            }
            let lifecycle_event = match new_status {
                OrderStatus::Completed => Some(Event::OrderCompleted(order_id)),
                OrderStatus::Cancelled => Some(Event::OrderCancelled(order_id)),
                _ => None,
            };
            if let Some(event) = lifecycle_event {
                if let Err(e) = event_sender.send(event).await {
                    warn!(error = %e, order_id = %order_id, "Failed to send lifecycle event");
                }
            }
        }

        let updated = self.load_order(order_id).await?;
        Ok(self.model_to_response(updated))
    }

    async fn load_order(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        let db = &*self.db_pool;
        Order::find_by_id(order_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                warn!(order_id = %order_id, "Order not found");
                ServiceError::NotFound(format!("Order {} not found", order_id))
            })
    }

    async fn load_lines(&self, order_id: Uuid) -> Result<Vec<ServiceLineModel>, ServiceError> {
        let db = &*self.db_pool;
        OrderServiceLine::find()
            .filter(order_service_line::Column::OrderId.eq(order_id))
            .order_by_asc(order_service_line::Column::Position)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn load_details(&self, order: OrderModel) -> Result<OrderDetailsResponse, ServiceError> {
        let db = &*self.db_pool;
        let order_id = order.id;

        let lines = self.load_lines(order_id).await?;
        let inspection_state = Inspection::find()
            .filter(inspection::Column::OrderId.eq(order_id))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        let appointment_state = Appointment::find()
            .filter(appointment::Column::OrderId.eq(order_id))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(OrderDetailsResponse {
            order: self.model_to_response(order),
            service_lines: lines
                .into_iter()
                .map(|line| self.line_to_response(line))
                .collect(),
            inspection: inspection_state.map(|model| self.inspection_to_response(model)),
            appointment: appointment_state.map(|model| self.appointment_to_response(model)),
        })
    }

    async fn load_bookable_definition(
        &self,
        service_id: Uuid,
    ) -> Result<ServiceDefinitionModel, ServiceError> {
        let db = &*self.db_pool;
        let def = ServiceDefinition::find_by_id(service_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                warn!(service_id = %service_id, "Service definition not found");
                ServiceError::NotFound(format!("Service definition {} not found", service_id))
            })?;
        if !def.is_active {
            return Err(ServiceError::ValidationError(format!(
                "Service {} is no longer offered",
                service_id
            )));
        }
        Ok(def)
    }

    fn model_to_response(&self, model: OrderModel) -> OrderResponse {
        OrderResponse {
            id: model.id,
            order_number: model.order_number,
            customer_id: model.customer_id,
            vehicle_id: model.vehicle_id,
            status: model.status,
            includes_inspection: model.includes_inspection,
            payment_method: model.payment_method,
            total_amount: model.total_amount,
            invoice_id: model.invoice_id,
            notes: model.notes,
            created_at: model.created_at,
            updated_at: model.updated_at,
            version: model.version,
        }
    }

    fn line_to_response(&self, model: ServiceLineModel) -> ServiceLineResponse {
        ServiceLineResponse {
            id: model.id,
            service_id: model.service_id,
            line_kind: model.line_kind,
            service_name: model.service_name,
            category: model.category,
            sub_category: model.sub_category,
            unit_price: model.unit_price,
            notes: model.notes,
            position: model.position,
        }
    }

    fn inspection_to_response(&self, model: InspectionModel) -> InspectionResponse {
        InspectionResponse {
            id: model.id,
            order_id: model.order_id,
            status: model.status,
            sub_category: model.sub_category,
            scheduled_date: model.scheduled_date,
            time_slot: model.time_slot,
            price: model.price,
            body_condition: model.body_condition,
            engine_condition: model.engine_condition,
            electrical_condition: model.electrical_condition,
            tire_condition: model.tire_condition,
            brake_condition: model.brake_condition,
            transmission_condition: model.transmission_condition,
            interior_condition: model.interior_condition,
            suspension_condition: model.suspension_condition,
            notes: model.notes,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    fn appointment_to_response(&self, model: AppointmentModel) -> AppointmentResponse {
        AppointmentResponse {
            id: model.id,
            order_id: model.order_id,
            mechanic_id: model.mechanic_id,
            appointment_date: model.appointment_date,
            time_slot: model.time_slot,
            status: model.status,
            notes: model.notes,
            created_at: model.created_at,
        }
    }
}

fn resolve_customer(
    principal: &Principal,
    requested: Option<Uuid>,
) -> Result<Uuid, ServiceError> {
    if principal.role.is_staff() {
        requested.ok_or_else(|| {
            ServiceError::ValidationError(
                "customer_id is required when booking on behalf of a customer".to_string(),
            )
        })
    } else {
        match requested {
            Some(customer_id) if customer_id != principal.id => Err(ServiceError::Forbidden(
                "Customers can only create orders for themselves".to_string(),
            )),
            _ => Ok(principal.id),
        }
    }
}

fn authorize_order_access(
    principal: &Principal,
    order: &OrderModel,
) -> Result<(), ServiceError> {
    if principal.role.is_staff() || order.customer_id == principal.id {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(
            "You do not have access to this order".to_string(),
        ))
    }
}

fn snapshot_line(
    order_id: Uuid,
    def: &ServiceDefinitionModel,
    kind: ServiceLineKind,
    position: i32,
    now: DateTime<Utc>,
) -> order_service_line::ActiveModel {
    order_service_line::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        service_id: Set(def.id),
        line_kind: Set(kind),
        service_name: Set(def.name.clone()),
        category: Set(def.category),
        sub_category: Set(def.sub_category.clone()),
        unit_price: Set(def.price),
        notes: Set(None),
        position: Set(position),
        created_at: Set(now),
    }
}

async fn update_order_status_guarded(
    txn: &sea_orm::DatabaseTransaction,
    order: &OrderModel,
    new_status: OrderStatus,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let changes = order::ActiveModel {
        status: Set(new_status),
        updated_at: Set(Some(now)),
        version: Set(order.version + 1),
        ..Default::default()
    };
    let result = Order::update_many()
        .set(changes)
        .filter(order::Column::Id.eq(order.id))
        .filter(order::Column::Version.eq(order.version))
        .exec(txn)
        .await
        .map_err(|e| {
            error!(error = %e, order_id = %order.id, "Failed to update order status");
            ServiceError::DatabaseError(e)
        })?;
    if result.rows_affected == 0 {
        warn!(order_id = %order.id, "Order changed concurrently");
        return Err(ServiceError::ConcurrentModification(order.id));
    }
    Ok(())
}

async fn update_appointment_status_guarded(
    txn: &sea_orm::DatabaseTransaction,
    state: &AppointmentModel,
    new_status: AppointmentStatus,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let changes = appointment::ActiveModel {
        status: Set(new_status),
        updated_at: Set(Some(now)),
        version: Set(state.version + 1),
        ..Default::default()
    };
    let result = Appointment::update_many()
        .set(changes)
        .filter(appointment::Column::Id.eq(state.id))
        .filter(appointment::Column::Version.eq(state.version))
        .exec(txn)
        .await
        .map_err(|e| {
            error!(error = %e, appointment_id = %state.id, "Failed to update appointment status");
            ServiceError::DatabaseError(e)
        })?;
    if result.rows_affected == 0 {
        warn!(appointment_id = %state.id, "Appointment changed concurrently");
        return Err(ServiceError::ConcurrentModification(state.id));
    }
    Ok(())
}
