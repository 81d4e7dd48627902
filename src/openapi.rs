use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "QuickBite API",
        version = "1.0.0",
        description = r#"
# QuickBite Ordering API

Backend for a fast-food counter: customer orders tracked through a fixed
lifecycle (OPEN → PENDING → RECEIVED → PREPARING → READY → COMPLETED, with
CANCELLED as the early exit) and payments reconciled against the external
payment provider.

## Error Handling

Failures use a consistent JSON body with the request id echoed back:

```json
{
  "error": "Bad Request",
  "message": "Invalid input: cannot transition order from OPEN to READY",
  "request_id": "req-abc123xyz",
  "timestamp": "2025-11-03T10:30:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Orders", description = "Order lifecycle endpoints"),
        (name = "Payments", description = "Checkout and provider notification endpoints"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::create_order,
        crate::handlers::orders::update_order,
        crate::handlers::orders::cancel_order,
        crate::handlers::orders::delete_order,
        crate::handlers::orders::add_order_item,
        crate::handlers::orders::get_order_items,
        crate::handlers::orders::update_order_item,
        crate::handlers::orders::remove_order_item,

        // Payments
        crate::handlers::payments::create_payment,
        crate::handlers::payments::get_order_payment,

        // Webhooks
        crate::handlers::payment_webhooks::payment_webhook,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,

            // Order types
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::UpdateOrderRequest,
            crate::services::orders::AddOrderItemRequest,
            crate::services::orders::UpdateOrderItemRequest,
            crate::services::orders::OrderResponse,
            crate::services::orders::OrderItemResponse,
            crate::services::orders::OrderListResponse,
            crate::models::OrderStatus,

            // Payment types
            crate::services::payments::PaymentResponse,
            crate::handlers::payment_webhooks::PaymentNotification,
            crate::models::PaymentStatus,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
