use crate::{
    auth::Principal,
    config::AppConfig,
    db::DbPool,
    entities::invoice::{self, Entity as Invoice, InvoiceStatus, Model as InvoiceModel},
    entities::invoice_item::{self, Entity as InvoiceItem, Model as InvoiceItemModel},
    entities::order::{self, Entity as Order, Model as OrderModel, OrderStatus, PaymentMethod},
    entities::order_service_line::{self, Entity as OrderServiceLine},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

const MAX_PAGE_SIZE: u64 = 100;

/// Billing knobs from configuration: the integer tax percentage applied on
/// top of the order total and the grace period before an unpaid invoice
/// counts as overdue.
#[derive(Debug, Clone)]
pub struct BillingPolicy {
    pub tax_rate_percent: u32,
    pub due_days: i64,
}

impl BillingPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            tax_rate_percent: config.tax_rate_percent,
            due_days: config.invoice_due_days,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub invoice_number: String,
    pub order_id: Uuid,
    pub customer_id: Uuid,
    /// Effective status: `overdue` is substituted on read while the stored
    /// status is unpaid and the due date has passed.
    pub status: InvoiceStatus,
    pub payment_method: PaymentMethod,
    pub invoice_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub sub_total: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub payment_reference: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub version: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InvoiceItemResponse {
    pub id: Uuid,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub position: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InvoiceGenerationResponse {
    pub invoice: InvoiceResponse,
    pub items: Vec<InvoiceItemResponse>,
    /// True when the order already had an invoice and nothing was created.
    pub is_existing: bool,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InvoiceDetailsResponse {
    pub invoice: InvoiceResponse,
    pub items: Vec<InvoiceItemResponse>,
    pub customer_id: Uuid,
    pub vehicle_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InvoiceListResponse {
    pub invoices: Vec<InvoiceResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

fn generate_invoice_number(now: &DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "INV-{}-{}",
        now.format("%Y%m%d"),
        suffix[..8].to_uppercase()
    )
}

fn compute_tax(sub_total: Decimal, tax_rate_percent: u32) -> Decimal {
    (sub_total * Decimal::from(tax_rate_percent) / Decimal::ONE_HUNDRED).round_dp(2)
}

/// Substitutes `overdue` for reporting while the invoice is unpaid past
/// its due date. The stored column keeps the real reconciliation state, so
/// an overdue invoice stays payable.
fn effective_status(
    status: InvoiceStatus,
    due_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> InvoiceStatus {
    match status {
        InvoiceStatus::Issued | InvoiceStatus::PendingCash if now > due_date => {
            InvoiceStatus::Overdue
        }
        other => other,
    }
}

/// Invoice generation and reporting. An invoice is a frozen snapshot of
/// exactly one completed order; generation is idempotent per order.
#[derive(Clone)]
pub struct InvoicingService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    policy: BillingPolicy,
}

impl InvoicingService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        policy: BillingPolicy,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            policy,
        }
    }

    /// Derives an invoice from a completed order. A second call for the
    /// same order returns the stored invoice untouched, flagged with
    /// `is_existing`.
    #[instrument(skip(self))]
    pub async fn generate_from_order(
        &self,
        principal: &Principal,
        order_id: Uuid,
    ) -> Result<InvoiceGenerationResponse, ServiceError> {
        principal.require_staff()?;

        let db = &*self.db_pool;

        let order = Order::find_by_id(order_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                warn!(order_id = %order_id, "Order not found for invoice generation");
                ServiceError::NotFound(format!("Order {} not found", order_id))
            })?;

        if let Some(existing) = Invoice::find()
            .filter(invoice::Column::OrderId.eq(order_id))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
        {
            info!(
                order_id = %order_id,
                invoice_id = %existing.id,
                "Order already invoiced, returning existing invoice"
            );
            let items = self.load_items(existing.id).await?;
            let payment_method = existing.payment_method;
            return Ok(InvoiceGenerationResponse {
                invoice: self.model_to_response(existing, Utc::now()),
                items,
                is_existing: true,
                payment_method,
            });
        }

        if order.status != OrderStatus::Completed {
            return Err(ServiceError::IllegalTransition(format!(
                "Cannot invoice a {} order, it must be completed first",
                order.status
            )));
        }

        let lines = OrderServiceLine::find()
            .filter(order_service_line::Column::OrderId.eq(order_id))
            .order_by_asc(order_service_line::Column::Position)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let now = Utc::now();
        let invoice_id = Uuid::new_v4();
        let invoice_number = generate_invoice_number(&now);
        let sub_total = order.total_amount;
        let tax_amount = compute_tax(sub_total, self.policy.tax_rate_percent);
        let total_amount = sub_total + tax_amount;
        let initial_status = match order.payment_method {
            PaymentMethod::Cash => InvoiceStatus::PendingCash,
            PaymentMethod::Online => InvoiceStatus::Issued,
        };

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for invoice generation");
            ServiceError::DatabaseError(e)
        })?;

        let invoice_model = invoice::ActiveModel {
            id: Set(invoice_id),
            invoice_number: Set(invoice_number.clone()),
            order_id: Set(order_id),
            customer_id: Set(order.customer_id),
            status: Set(initial_status),
            payment_method: Set(order.payment_method),
            invoice_date: Set(now),
            due_date: Set(now + Duration::days(self.policy.due_days)),
            sub_total: Set(sub_total),
            tax_amount: Set(tax_amount),
            total_amount: Set(total_amount),
            payment_reference: Set(None),
            paid_at: Set(None),
            created_at: Set(now),
            updated_at: Set(None),
            version: Set(1),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to insert invoice");
            ServiceError::DatabaseError(e)
        })?;

        let mut item_models = Vec::with_capacity(lines.len());
        for line in &lines {
            let item = invoice_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                invoice_id: Set(invoice_id),
                description: Set(line.service_name.clone()),
                quantity: Set(1),
                unit_price: Set(line.unit_price),
                total_price: Set(line.unit_price),
                position: Set(line.position),
                created_at: Set(now),
            };
            item_models.push(item.insert(&txn).await.map_err(|e| {
                error!(error = %e, invoice_id = %invoice_id, "Failed to insert invoice item");
                ServiceError::DatabaseError(e)
            })?);
        }

        let changes = order::ActiveModel {
            invoice_id: Set(Some(invoice_id)),
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
                error!(error = %e, order_id = %order_id, "Failed to link invoice to order");
                ServiceError::DatabaseError(e)
            })?;
        if result.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(order_id));
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, invoice_id = %invoice_id, "Failed to commit invoice generation");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            order_id = %order_id,
            invoice_id = %invoice_id,
            invoice_number = %invoice_number,
            total_amount = %total_amount,
            "Invoice generated successfully"
        );

        if let Some(event_sender) = &self.event_sender {
            let event = Event::InvoiceGenerated {
                invoice_id,
                order_id,
            };
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, invoice_id = %invoice_id, "Failed to send invoice generated event");
            }
        }

        let payment_method = invoice_model.payment_method;
        Ok(InvoiceGenerationResponse {
            invoice: self.model_to_response(invoice_model, now),
            items: item_models
                .into_iter()
                .map(|item| self.item_to_response(item))
                .collect(),
            is_existing: false,
            payment_method,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_invoice(
        &self,
        principal: &Principal,
        invoice_id: Uuid,
    ) -> Result<InvoiceDetailsResponse, ServiceError> {
        let db = &*self.db_pool;

        let invoice_model = self.load_invoice(invoice_id).await?;
        if !principal.role.is_staff() && invoice_model.customer_id != principal.id {
            return Err(ServiceError::Forbidden(
                "You do not have access to this invoice".to_string(),
            ));
        }

        let owning_order: Option<OrderModel> = Order::find_by_id(invoice_model.order_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        let vehicle_id = owning_order.map(|o| o.vehicle_id).ok_or_else(|| {
            error!(invoice_id = %invoice_id, "Invoice references a missing order");
            ServiceError::InternalError(format!(
                "Invoice {} references a missing order",
                invoice_id
            ))
        })?;

        let items = self.load_items(invoice_id).await?;
        let customer_id = invoice_model.customer_id;

        Ok(InvoiceDetailsResponse {
            invoice: self.model_to_response(invoice_model, Utc::now()),
            items,
            customer_id,
            vehicle_id,
        })
    }

    /// Paginated listing. The status filter matches the effective status,
    /// so `overdue` selects unpaid invoices past their due date and
    /// `issued`/`pending_cash` exclude them.
    #[instrument(skip(self))]
    pub async fn list_invoices(
        &self,
        principal: &Principal,
        status: Option<InvoiceStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<InvoiceListResponse, ServiceError> {
        principal.require_staff()?;

        let db = &*self.db_pool;
        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PAGE_SIZE);
        let now = Utc::now();

        let mut query = Invoice::find();
        match status {
            Some(InvoiceStatus::Overdue) => {
                query = query
                    .filter(
                        invoice::Column::Status
                            .is_in([InvoiceStatus::Issued, InvoiceStatus::PendingCash]),
                    )
                    .filter(invoice::Column::DueDate.lt(now));
            }
            Some(InvoiceStatus::Paid) => {
                query = query.filter(invoice::Column::Status.eq(InvoiceStatus::Paid));
            }
            Some(stored) => {
                query = query
                    .filter(invoice::Column::Status.eq(stored))
                    .filter(invoice::Column::DueDate.gte(now));
            }
            None => {}
        }

        let paginator = query
            .order_by_desc(invoice::Column::CreatedAt)
            .paginate(db, per_page);

        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let invoices = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(InvoiceListResponse {
            invoices: invoices
                .into_iter()
                .map(|model| self.model_to_response(model, now))
                .collect(),
            total,
            page,
            per_page,
        })
    }

    async fn load_invoice(&self, invoice_id: Uuid) -> Result<InvoiceModel, ServiceError> {
        let db = &*self.db_pool;
        Invoice::find_by_id(invoice_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                warn!(invoice_id = %invoice_id, "Invoice not found");
                ServiceError::NotFound(format!("Invoice {} not found", invoice_id))
            })
    }

    async fn load_items(
        &self,
        invoice_id: Uuid,
    ) -> Result<Vec<InvoiceItemResponse>, ServiceError> {
        let db = &*self.db_pool;
        let items = InvoiceItem::find()
            .filter(invoice_item::Column::InvoiceId.eq(invoice_id))
            .order_by_asc(invoice_item::Column::Position)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(items
            .into_iter()
            .map(|item| self.item_to_response(item))
            .collect())
    }

    fn model_to_response(&self, model: InvoiceModel, now: DateTime<Utc>) -> InvoiceResponse {
        InvoiceResponse {
            id: model.id,
            invoice_number: model.invoice_number,
            order_id: model.order_id,
            customer_id: model.customer_id,
            status: effective_status(model.status, model.due_date, now),
            payment_method: model.payment_method,
            invoice_date: model.invoice_date,
            due_date: model.due_date,
            sub_total: model.sub_total,
            tax_amount: model.tax_amount,
            total_amount: model.total_amount,
            payment_reference: model.payment_reference,
            paid_at: model.paid_at,
            created_at: model.created_at,
            version: model.version,
        }
    }

    fn item_to_response(&self, model: InvoiceItemModel) -> InvoiceItemResponse {
        InvoiceItemResponse {
            id: model.id,
            description: model.description,
            quantity: model.quantity,
            unit_price: model.unit_price,
            total_price: model.total_price,
            position: model.position,
        }
    }
}
