use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

// Define the various events that can occur in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Repair order events
    OrderCreated(Uuid),
    OrderCompleted(Uuid),
    OrderCancelled(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    ServiceAddedToOrder {
        order_id: Uuid,
        service_id: Uuid,
    },
    MechanicAssigned {
        order_id: Uuid,
        appointment_id: Uuid,
        mechanic_id: Uuid,
    },
    InspectionResultsRecorded {
        order_id: Uuid,
        inspection_id: Uuid,
    },
    InspectionTransferred {
        order_id: Uuid,
        service_id: Uuid,
    },

    // Workshop scheduling events
    SlotReserved {
        slot_date: NaiveDate,
        slot_label: String,
    },
    SlotReleased {
        slot_date: NaiveDate,
        slot_label: String,
    },

    // Billing events
    InvoiceGenerated {
        invoice_id: Uuid,
        order_id: Uuid,
    },
    PaymentRecorded {
        invoice_id: Uuid,
        method: String,
    },
}

// Function to process incoming events and distribute them to registered event handlers.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        info!("Received event: {:?}", event);

        match event {
            Event::OrderCreated(order_id) => {
                if let Err(e) = handle_order_created(order_id).await {
                    error!(
                        "Failed to handle order created event: order_id={}, error={}",
                        order_id, e
                    );
                }
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(
                    "Order {} moved from {} to {}",
                    order_id, old_status, new_status
                );
            }
            Event::MechanicAssigned {
                order_id,
                appointment_id,
                mechanic_id,
            } => {
                if let Err(e) =
                    handle_mechanic_assigned(order_id, appointment_id, mechanic_id).await
                {
                    error!(
                        "Failed to handle mechanic assignment: order_id={}, error={}",
                        order_id, e
                    );
                }
            }
            Event::SlotReserved {
                slot_date,
                slot_label,
            } => {
                info!("Slot reserved: {} {}", slot_date, slot_label);
            }
            Event::SlotReleased {
                slot_date,
                slot_label,
            } => {
                info!("Slot released: {} {}", slot_date, slot_label);
            }
            Event::InvoiceGenerated {
                invoice_id,
                order_id,
            } => {
                info!(
                    "Invoice {} generated for order {}",
                    invoice_id, order_id
                );
            }
            Event::PaymentRecorded { invoice_id, method } => {
                info!("Payment recorded for invoice {} via {}", invoice_id, method);
            }
            _ => {
                info!("No specific handler for event: {:?}", event);
            }
        }
    }

    warn!("Event processing loop has ended");
}

// Handler functions for specific events
async fn handle_order_created(order_id: Uuid) -> Result<(), String> {
    // Downstream systems (front desk board, customer notifications) key off
    // this event
    info!("Processing order created event for order {}", order_id);

    Ok(())
}

async fn handle_mechanic_assigned(
    order_id: Uuid,
    appointment_id: Uuid,
    mechanic_id: Uuid,
) -> Result<(), String> {
    info!(
        "Mechanic {} assigned to order {} (appointment {})",
        mechanic_id, order_id, appointment_id
    );

    Ok(())
}
