use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "AutoShop API",
        version = "1.0.0",
        description = r#"
# AutoShop Service Coordination API

The backend for an automotive service shop: the service catalog, the daily
time-slot schedule, repair order lifecycle and invoicing with payment
reconciliation.

## Features

- **Service Catalog**: Repair, maintenance and inspection offerings with prices
- **Scheduling**: Capacity-bounded time slots per day, availability on demand
- **Repair Orders**: Booking, mechanic assignment, inspection findings and
  status lifecycle
- **Invoicing**: One invoice per completed order with tax and due dates
- **Payments**: Cash and online settlement against issued invoices

## Authentication

The service runs behind the shop gateway, which authenticates callers and
forwards identity as trusted headers:

```
x-user-id: <caller UUID>
x-user-role: customer | mechanic | admin
```

## Error Handling

Errors share one response shape with a stable machine-readable `code`:

```json
{
  "error": "Conflict",
  "code": "slot_full",
  "message": "Slot full: no capacity left in 09:00-10:00 on 2025-03-14",
  "request_id": "req-abc123xyz",
  "timestamp": "2025-03-14T10:30:00.000Z"
}
```

## Pagination

List endpoints accept `page` (default 1) and `per_page` (default 20, max 100).
        "#,
        contact(
            name = "AutoShop Support",
            email = "support@autoshop.example"
        ),
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "https://api.autoshop.example", description = "Production server"),
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Availability", description = "Time-slot availability"),
        (name = "Service Catalog", description = "Service definition management"),
        (name = "Orders", description = "Repair order lifecycle"),
        (name = "Invoices", description = "Invoice generation and lookup"),
        (name = "Payments", description = "Invoice settlement"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Availability
        crate::handlers::availability::get_availability,

        // Service catalog
        crate::handlers::services::create_service,
        crate::handlers::services::list_services,
        crate::handlers::services::get_service,
        crate::handlers::services::update_service,
        crate::handlers::services::delete_service,

        // Orders
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::add_service,
        crate::handlers::orders::assign_mechanic,
        crate::handlers::orders::transfer_to_service,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::record_inspection,

        // Invoices
        crate::handlers::invoices::generate_invoice,
        crate::handlers::invoices::get_invoice,
        crate::handlers::invoices::list_invoices,

        // Payments
        crate::handlers::payments::process_cash_payment,
        crate::handlers::payments::process_online_payment,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,

            // Domain enums
            crate::entities::order::OrderStatus,
            crate::entities::order::PaymentMethod,
            crate::entities::service_definition::ServiceCategory,
            crate::entities::order_service_line::ServiceLineKind,
            crate::entities::inspection::InspectionStatus,
            crate::entities::appointment::AppointmentStatus,
            crate::entities::invoice::InvoiceStatus,

            // Catalog types
            crate::services::catalog::CreateServiceDefinitionRequest,
            crate::services::catalog::UpdateServiceDefinitionRequest,
            crate::services::catalog::ServiceDefinitionResponse,
            crate::services::catalog::ServiceDefinitionListResponse,

            // Scheduling types
            crate::services::scheduler::SlotAvailability,

            // Order types
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::AssignMechanicRequest,
            crate::services::orders::AddServiceRequest,
            crate::services::orders::UpdateOrderStatusRequest,
            crate::services::orders::UpdateInspectionRequest,
            crate::services::orders::OrderResponse,
            crate::services::orders::ServiceLineResponse,
            crate::services::orders::InspectionResponse,
            crate::services::orders::AppointmentResponse,
            crate::services::orders::OrderDetailsResponse,
            crate::services::orders::OrderListResponse,

            // Invoice types
            crate::services::invoicing::InvoiceResponse,
            crate::services::invoicing::InvoiceItemResponse,
            crate::services::invoicing::InvoiceGenerationResponse,
            crate::services::invoicing::InvoiceDetailsResponse,
            crate::services::invoicing::InvoiceListResponse,

            // Payment types
            crate::services::payments::ProcessCashPaymentRequest,
            crate::services::payments::ProcessOnlinePaymentRequest,
            crate::services::payments::PaymentConfirmationResponse,

            // Error types
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "gateway_auth",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "x-user-id",
                    "Caller identity forwarded by the shop gateway, paired with x-user-role",
                ))),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_generates() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("AutoShop API"));
        assert!(json.contains("/api/v1/orders"));
        assert!(json.contains("gateway_auth"));
    }
}
