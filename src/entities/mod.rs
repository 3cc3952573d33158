pub mod appointment;
pub mod inspection;
pub mod invoice;
pub mod invoice_item;
pub mod order;
pub mod order_service_line;
pub mod service_definition;
pub mod time_slot;
