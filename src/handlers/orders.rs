use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

use super::common::PaginationParams;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::models::OrderStatus;
use crate::repositories::OrderFilter;
use crate::services::orders::{
    AddOrderItemRequest, CreateOrderRequest, OrderItemResponse, OrderListResponse, OrderResponse,
    UpdateOrderItemRequest, UpdateOrderRequest,
};
use crate::ApiResponse;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct OrderListFilter {
    /// Filter by owning customer
    pub customer_id: Option<Uuid>,
    /// Filter by lifecycle status (OPEN, PENDING, RECEIVED, ...)
    pub status: Option<String>,
}

/// Create an order
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = crate::ApiResponse<OrderResponse>),
        (status = 400, description = "Bad request", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), ServiceError> {
    let response = state.services.orders.create_order(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

/// Get an order with its line items
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order details", body = crate::ApiResponse<OrderResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let response = state.services.orders.get_order(id).await?;
    Ok(Json(ApiResponse::success(response)))
}

/// List orders with optional customer/status filters
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(PaginationParams, OrderListFilter),
    responses(
        (status = 200, description = "Orders page", body = crate::ApiResponse<OrderListResponse>),
        (status = 400, description = "Bad request", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<OrderListFilter>,
) -> Result<Json<ApiResponse<OrderListResponse>>, ServiceError> {
    let status = match filter.status.as_deref() {
        None => None,
        Some(raw) => Some(OrderStatus::parse(raw).ok_or_else(|| {
            ServiceError::InvalidInput(format!("unknown order status '{}'", raw))
        })?),
    };

    let response = state
        .services
        .orders
        .list_orders(
            OrderFilter {
                customer_id: filter.customer_id,
                status,
            },
            pagination.page,
            pagination.per_page,
        )
        .await?;

    Ok(Json(ApiResponse::success(response)))
}

/// Update an order's customer/status
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Order updated", body = crate::ApiResponse<OrderResponse>),
        (status = 400, description = "Illegal transition or missing staff actor", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateOrderRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let response = state.services.orders.update_order(id, request).await?;
    Ok(Json(ApiResponse::success(response)))
}

/// Cancel an order
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order cancelled", body = crate::ApiResponse<OrderResponse>),
        (status = 400, description = "Order is past cancellation", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let response = state.services.orders.cancel_order(id).await?;
    Ok(Json(ApiResponse::success(response)))
}

/// Delete an order
#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order deleted", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<HashMap<String, String>>>, ServiceError> {
    state.services.orders.delete_order(id).await?;
    let mut body = HashMap::new();
    body.insert("deleted".to_string(), id.to_string());
    Ok(Json(ApiResponse::success(body)))
}

/// Attach a product line to an order
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/items",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = AddOrderItemRequest,
    responses(
        (status = 201, description = "Item added", body = crate::ApiResponse<OrderResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Product already on order", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn add_order_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AddOrderItemRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), ServiceError> {
    let response = state.services.orders.add_item(id, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

/// List an order's line items
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/items",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order items", body = crate::ApiResponse<Vec<OrderItemResponse>>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order_items(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<OrderItemResponse>>>, ServiceError> {
    let response = state.services.orders.list_items(id).await?;
    Ok(Json(ApiResponse::success(response)))
}

/// Update a line item's quantity/price
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/items/{product_id}",
    params(
        ("id" = Uuid, Path, description = "Order ID"),
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    request_body = UpdateOrderItemRequest,
    responses(
        (status = 200, description = "Item updated", body = crate::ApiResponse<OrderResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn update_order_item(
    State(state): State<AppState>,
    Path((id, product_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateOrderItemRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let response = state
        .services
        .orders
        .update_item(id, product_id, request)
        .await?;
    Ok(Json(ApiResponse::success(response)))
}

/// Remove a line item
#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}/items/{product_id}",
    params(
        ("id" = Uuid, Path, description = "Order ID"),
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Item removed", body = crate::ApiResponse<OrderResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn remove_order_item(
    State(state): State<AppState>,
    Path((id, product_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let response = state.services.orders.remove_item(id, product_id).await?;
    Ok(Json(ApiResponse::success(response)))
}

/// Order routes
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order))
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id", put(update_order))
        .route("/:id", delete(delete_order))
        .route("/:id/cancel", post(cancel_order))
        .route("/:id/items", post(add_order_item))
        .route("/:id/items", get(get_order_items))
        .route("/:id/items/:product_id", put(update_order_item))
        .route("/:id/items/:product_id", delete(remove_order_item))
}
