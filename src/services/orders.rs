use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{order, order_item},
    errors::ServiceError,
    events::{Event, EventSender},
    models::OrderStatus,
    repositories::{OrderFilter, OrderStore},
};

/// Request/Response types for the order service
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub customer_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderRequest {
    /// Must match the order's current customer when present
    pub customer_id: Option<Uuid>,
    /// Target lifecycle status; omitted leaves the status unchanged
    pub status: Option<String>,
    /// Employee performing the change; required for kitchen/counter transitions
    pub staff_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct AddOrderItemRequest {
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 120, message = "Product name is required"))]
    pub product_name: String,
    pub product_description: Option<String>,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderItemRequest {
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub product_id: Uuid,
    pub product_name: String,
    pub product_description: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub status: String,
    pub total_amount: Decimal,
    pub items: Vec<OrderItemResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Service for managing orders through their lifecycle
#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderStore>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            orders,
            event_sender,
        }
    }

    /// Creates a new order in status OPEN with no line items
    #[instrument(skip(self, request), fields(customer_id = %request.customer_id))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        let now = Utc::now();
        let order = order::Model {
            id: Uuid::new_v4(),
            customer_id: request.customer_id,
            status: OrderStatus::Open.as_str().to_string(),
            total_amount: Decimal::ZERO,
            created_at: now,
            updated_at: Some(now),
            version: 1,
        };

        let created = self.orders.create(order).await?;
        info!(order_id = %created.id, "Order created");

        self.emit(Event::OrderCreated(created.id)).await;

        Ok(model_to_response(created, Vec::new()))
    }

    /// Retrieves an order together with its line items
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let order = self.require_order(order_id).await?;
        let items = self.orders.find_items(order_id).await?;
        Ok(model_to_response(order, items))
    }

    /// Lists orders with optional customer/status filters
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        filter: OrderFilter,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        let (orders, total) = self.orders.find_all(filter, page, per_page).await?;

        let responses = orders
            .into_iter()
            .map(|order| model_to_response(order, Vec::new()))
            .collect();

        Ok(OrderListResponse {
            orders: responses,
            total,
            page,
            per_page,
        })
    }

    /// Applies a customer/status update through the aggregate guard. Line
    /// items are untouched by this path.
    #[instrument(skip(self, request), fields(order_id = %order_id))]
    pub async fn update_order(
        &self,
        order_id: Uuid,
        request: UpdateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        let new_status = match request.status.as_deref() {
            None => None,
            Some(raw) => Some(OrderStatus::parse(raw).ok_or_else(|| {
                ServiceError::InvalidInput(format!("unknown order status '{}'", raw))
            })?),
        };

        let mut order = self.require_order(order_id).await?;
        let old_status = order.status.clone();

        order.apply_update(request.customer_id, new_status, request.staff_id)?;

        let updated = self.orders.update(order).await?;
        let items = self.orders.find_items(order_id).await?;

        if updated.status != old_status {
            info!(order_id = %order_id, old_status = %old_status, new_status = %updated.status, "Order status updated");
            self.emit(Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status: updated.status.clone(),
            })
            .await;
        } else {
            self.emit(Event::OrderUpdated(order_id)).await;
        }

        Ok(model_to_response(updated, items))
    }

    /// Cancels an order (OPEN only; elsewhere the transition table rejects it)
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn cancel_order(&self, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let response = self
            .update_order(
                order_id,
                UpdateOrderRequest {
                    customer_id: None,
                    status: Some(OrderStatus::Cancelled.as_str().to_string()),
                    staff_id: None,
                },
            )
            .await?;

        self.emit(Event::OrderCancelled(order_id)).await;
        Ok(response)
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn delete_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        self.orders.delete(order_id).await?;
        info!(order_id = %order_id, "Order deleted");
        self.emit(Event::OrderDeleted(order_id)).await;
        Ok(())
    }

    /// Attaches a line item and rederives the order total
    #[instrument(skip(self, request), fields(order_id = %order_id, product_id = %request.product_id))]
    pub async fn add_item(
        &self,
        order_id: Uuid,
        request: AddOrderItemRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;

        let order = self.require_order(order_id).await?;

        if self
            .orders
            .find_item(order_id, request.product_id)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict(format!(
                "product {} is already on order {}",
                request.product_id, order_id
            )));
        }

        let now = Utc::now();
        let item = order_item::Model {
            order_id,
            product_id: request.product_id,
            product_name: request.product_name,
            product_description: request.product_description,
            quantity: request.quantity,
            unit_price: request.unit_price,
            created_at: now,
            updated_at: Some(now),
        };
        self.orders.insert_item(item).await?;

        self.refresh_total(order).await
    }

    /// Updates a line item's quantity/price snapshot and rederives the total
    #[instrument(skip(self, request), fields(order_id = %order_id, product_id = %product_id))]
    pub async fn update_item(
        &self,
        order_id: Uuid,
        product_id: Uuid,
        request: UpdateOrderItemRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;

        let order = self.require_order(order_id).await?;

        let mut item = self
            .orders
            .find_item(order_id, product_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Order {} has no line for product {}",
                    order_id, product_id
                ))
            })?;
        item.quantity = request.quantity;
        item.unit_price = request.unit_price;
        self.orders.update_item(item).await?;

        self.refresh_total(order).await
    }

    /// Detaches a line item and rederives the total
    #[instrument(skip(self), fields(order_id = %order_id, product_id = %product_id))]
    pub async fn remove_item(
        &self,
        order_id: Uuid,
        product_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        let order = self.require_order(order_id).await?;
        self.orders.delete_item(order_id, product_id).await?;
        self.refresh_total(order).await
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn list_items(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<OrderItemResponse>, ServiceError> {
        self.require_order(order_id).await?;
        let items = self.orders.find_items(order_id).await?;
        Ok(items.into_iter().map(item_to_response).collect())
    }

    async fn require_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        self.orders.find_by_id(order_id).await?.ok_or_else(|| {
            warn!(order_id = %order_id, "Order not found");
            ServiceError::NotFound(format!("Order {} not found", order_id))
        })
    }

    async fn refresh_total(
        &self,
        mut order: order::Model,
    ) -> Result<OrderResponse, ServiceError> {
        let items = self.orders.find_items(order.id).await?;
        order.total_amount = order::total_from_items(&items);
        order.updated_at = Some(Utc::now());

        let updated = self.orders.update(order).await?;
        self.emit(Event::OrderUpdated(updated.id)).await;

        Ok(model_to_response(updated, items))
    }

    async fn emit(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "Failed to send order event");
            }
        }
    }
}

fn item_to_response(item: order_item::Model) -> OrderItemResponse {
    let subtotal = item.subtotal();
    OrderItemResponse {
        product_id: item.product_id,
        product_name: item.product_name,
        product_description: item.product_description,
        quantity: item.quantity,
        unit_price: item.unit_price,
        subtotal,
    }
}

fn model_to_response(model: order::Model, items: Vec<order_item::Model>) -> OrderResponse {
    OrderResponse {
        id: model.id,
        customer_id: model.customer_id,
        status: model.status,
        total_amount: model.total_amount,
        items: items.into_iter().map(item_to_response).collect(),
        created_at: model.created_at,
        updated_at: model.updated_at,
        version: model.version,
    }
}
