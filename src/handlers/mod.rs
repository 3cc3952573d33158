pub mod availability;
pub mod common;
pub mod invoices;
pub mod orders;
pub mod payments;
pub mod services;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::catalog::CatalogService;
use crate::services::invoicing::{BillingPolicy, InvoicingService};
use crate::services::orders::OrderService;
use crate::services::payments::PaymentService;
use crate::services::scheduler::{SchedulerService, SlotPlan};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub scheduler: Arc<SchedulerService>,
    pub orders: Arc<OrderService>,
    pub invoicing: Arc<InvoicingService>,
    pub payments: Arc<PaymentService>,
}

impl AppServices {
    /// Wires every service against the shared pool and event channel. The
    /// order service holds its own scheduler handle for slot bookkeeping.
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        config: &AppConfig,
    ) -> Self {
        let scheduler = SchedulerService::new(
            db_pool.clone(),
            event_sender.clone(),
            SlotPlan::from_config(config),
        );
        let orders = OrderService::new(db_pool.clone(), event_sender.clone(), scheduler.clone());
        let invoicing = InvoicingService::new(
            db_pool.clone(),
            event_sender.clone(),
            BillingPolicy::from_config(config),
        );

        Self {
            catalog: Arc::new(CatalogService::new(db_pool.clone())),
            scheduler: Arc::new(scheduler),
            orders: Arc::new(orders),
            invoicing: Arc::new(invoicing),
            payments: Arc::new(PaymentService::new(db_pool, event_sender)),
        }
    }
}
