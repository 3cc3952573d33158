use crate::{
    auth::Principal,
    db::DbPool,
    entities::invoice::{self, Entity as Invoice, InvoiceStatus, Model as InvoiceModel},
    entities::order::PaymentMethod,
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ProcessCashPaymentRequest {
    pub invoice_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ProcessOnlinePaymentRequest {
    pub invoice_id: Uuid,
    #[validate(length(
        min = 1,
        max = 128,
        message = "Payment reference must be between 1 and 128 characters"
    ))]
    pub payment_reference: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentConfirmationResponse {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub status: InvoiceStatus,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_reference: Option<String>,
    pub paid_at: DateTime<Utc>,
}

/// A cash payment settles an invoice that was issued for desk settlement.
/// Paying twice is rejected without touching the row.
fn ensure_cash_payable(status: InvoiceStatus, invoice_id: Uuid) -> Result<(), ServiceError> {
    match status {
        InvoiceStatus::PendingCash => Ok(()),
        InvoiceStatus::Paid => Err(ServiceError::AlreadyPaid(invoice_id)),
        InvoiceStatus::Issued | InvoiceStatus::Overdue => Err(ServiceError::IllegalTransition(
            format!("Invoice {} is not awaiting cash payment", invoice_id),
        )),
    }
}

/// An online payment settles an issued invoice; cash invoices must go
/// through the desk flow instead.
fn ensure_online_payable(status: InvoiceStatus, invoice_id: Uuid) -> Result<(), ServiceError> {
    match status {
        InvoiceStatus::Issued => Ok(()),
        InvoiceStatus::Paid => Err(ServiceError::AlreadyPaid(invoice_id)),
        InvoiceStatus::PendingCash | InvoiceStatus::Overdue => {
            Err(ServiceError::IllegalTransition(format!(
                "Invoice {} is not payable online",
                invoice_id
            )))
        }
    }
}

/// Payment reconciliation against stored invoice state. The overdue
/// reporting status never blocks payment because these checks read the
/// stored column, which stays `issued` or `pending_cash` until paid.
#[derive(Clone)]
pub struct PaymentService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl PaymentService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self, request), fields(invoice_id = %request.invoice_id))]
    pub async fn process_cash_payment(
        &self,
        principal: &Principal,
        request: ProcessCashPaymentRequest,
    ) -> Result<PaymentConfirmationResponse, ServiceError> {
        principal.require_staff()?;

        let invoice_model = self.load_invoice(request.invoice_id).await?;
        ensure_cash_payable(invoice_model.status, invoice_model.id)?;

        let paid = self.mark_paid(invoice_model, None).await?;

        info!(invoice_id = %paid.id, "Cash payment recorded successfully");
        self.send_payment_event(paid.id, PaymentMethod::Cash).await;

        Ok(self.confirmation(paid))
    }

    #[instrument(skip(self, request), fields(invoice_id = %request.invoice_id))]
    pub async fn process_online_payment(
        &self,
        principal: &Principal,
        request: ProcessOnlinePaymentRequest,
    ) -> Result<PaymentConfirmationResponse, ServiceError> {
        principal.require_staff()?;
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let invoice_model = self.load_invoice(request.invoice_id).await?;
        ensure_online_payable(invoice_model.status, invoice_model.id)?;

        let paid = self
            .mark_paid(invoice_model, Some(request.payment_reference))
            .await?;

        info!(invoice_id = %paid.id, "Online payment recorded successfully");
        self.send_payment_event(paid.id, PaymentMethod::Online).await;

        Ok(self.confirmation(paid))
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

    /// Settles the invoice under the optimistic version guard, then
    /// re-reads the row so the confirmation reflects what was stored.
    async fn mark_paid(
        &self,
        invoice_model: InvoiceModel,
        payment_reference: Option<String>,
    ) -> Result<InvoiceModel, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();
        let invoice_id = invoice_model.id;

        let mut changes = invoice::ActiveModel {
            status: Set(InvoiceStatus::Paid),
            paid_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            version: Set(invoice_model.version + 1),
            ..Default::default()
        };
        if payment_reference.is_some() {
            changes.payment_reference = Set(payment_reference);
        }

        let result = Invoice::update_many()
            .set(changes)
            .filter(invoice::Column::Id.eq(invoice_id))
            .filter(invoice::Column::Version.eq(invoice_model.version))
            .exec(db)
            .await
            .map_err(|e| {
                error!(error = %e, invoice_id = %invoice_id, "Failed to record payment");
                ServiceError::DatabaseError(e)
            })?;
        if result.rows_affected == 0 {
            warn!(invoice_id = %invoice_id, "Invoice changed concurrently while paying");
            return Err(ServiceError::ConcurrentModification(invoice_id));
        }

        Invoice::find_by_id(invoice_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Invoice {} disappeared while recording payment",
                    invoice_id
                ))
            })
    }

    async fn send_payment_event(&self, invoice_id: Uuid, method: PaymentMethod) {
        if let Some(event_sender) = &self.event_sender {
            let event = Event::PaymentRecorded {
                invoice_id,
                method: method.to_string(),
            };
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, invoice_id = %invoice_id, "Failed to send payment recorded event");
            }
        }
    }

    fn confirmation(&self, model: InvoiceModel) -> PaymentConfirmationResponse {
        PaymentConfirmationResponse {
            invoice_id: model.id,
            invoice_number: model.invoice_number,
            status: model.status,
            amount: model.total_amount,
            payment_method: model.payment_method,
            payment_reference: model.payment_reference,
            paid_at: model.paid_at.unwrap_or_else(Utc::now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use sea_orm::DatabaseConnection;

    fn service() -> PaymentService {
        PaymentService::new(Arc::new(DatabaseConnection::Disconnected), None)
    }

    fn staff() -> Principal {
        Principal {
            id: Uuid::new_v4(),
            role: crate::auth::Role::Admin,
        }
    }

    #[rstest]
    #[case(InvoiceStatus::PendingCash, true)]
    #[case(InvoiceStatus::Issued, false)]
    #[case(InvoiceStatus::Paid, false)]
    fn cash_payment_requires_pending_cash(#[case] status: InvoiceStatus, #[case] payable: bool) {
        assert_eq!(ensure_cash_payable(status, Uuid::new_v4()).is_ok(), payable);
    }

    #[rstest]
    #[case(InvoiceStatus::Issued, true)]
    #[case(InvoiceStatus::PendingCash, false)]
    #[case(InvoiceStatus::Paid, false)]
    fn online_payment_requires_issued(#[case] status: InvoiceStatus, #[case] payable: bool) {
        assert_eq!(ensure_online_payable(status, Uuid::new_v4()).is_ok(), payable);
    }

    #[test]
    fn paid_invoices_surface_already_paid() {
        let invoice_id = Uuid::new_v4();

        assert_matches!(
            ensure_cash_payable(InvoiceStatus::Paid, invoice_id),
            Err(ServiceError::AlreadyPaid(id)) if id == invoice_id
        );
        assert_matches!(
            ensure_online_payable(InvoiceStatus::Paid, invoice_id),
            Err(ServiceError::AlreadyPaid(id)) if id == invoice_id
        );
    }

    #[tokio::test]
    async fn online_payment_rejects_blank_references() {
        let request = ProcessOnlinePaymentRequest {
            invoice_id: Uuid::new_v4(),
            payment_reference: String::new(),
        };

        let result = service().process_online_payment(&staff(), request).await;

        assert_matches!(result, Err(ServiceError::ValidationError(_)));
    }
}
