// Reference data and scheduling
pub mod catalog;
pub mod scheduler;

// Order lifecycle
pub mod orders;

// Financial services
pub mod invoicing;
pub mod payments;
