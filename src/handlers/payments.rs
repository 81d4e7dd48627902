use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::payments::PaymentResponse;
use crate::ApiResponse;

/// Start checkout for an order
///
/// Idempotent: while the order already has a payment in PROCESSING the same
/// payment is returned and the provider is not charged again.
#[utoipa::path(
    post,
    path = "/api/v1/payments/{order_id}/checkout",
    params(("order_id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 201, description = "Payment initiated", body = crate::ApiResponse<PaymentResponse>),
        (status = 404, description = "Order missing or empty", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment provider failure", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn create_payment(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentResponse>>), ServiceError> {
    let response = state.services.payments.create_payment(order_id).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

/// Latest payment recorded for an order
#[utoipa::path(
    get,
    path = "/api/v1/payments/order/{order_id}",
    params(("order_id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Payment details", body = crate::ApiResponse<PaymentResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn get_order_payment(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ApiResponse<PaymentResponse>>, ServiceError> {
    let response = state.services.payments.get_order_payment(order_id).await?;
    Ok(Json(ApiResponse::success(response)))
}

/// Payment routes
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/:order_id/checkout", post(create_payment))
        .route("/order/:order_id", get(get_order_payment))
}
