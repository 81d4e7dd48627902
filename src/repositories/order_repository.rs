use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::order::{
    ActiveModel as OrderActiveModel, Column, Entity as Order, Model as OrderModel,
};
use crate::entities::order_item::{
    Column as ItemColumn, Entity as OrderItem, Model as OrderItemModel,
};
use crate::errors::ServiceError;
use crate::models::OrderStatus;
use crate::repositories::Repository;

use super::BaseRepository;

/// Filters accepted by the order listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderFilter {
    pub customer_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
}

/// Persistence port for orders and their line items.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<OrderModel>, ServiceError>;
    async fn find_all(
        &self,
        filter: OrderFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<OrderModel>, u64), ServiceError>;
    async fn create(&self, order: OrderModel) -> Result<OrderModel, ServiceError>;
    /// Writes the order row only; line items are not touched by an order update.
    async fn update(&self, order: OrderModel) -> Result<OrderModel, ServiceError>;
    async fn delete(&self, id: Uuid) -> Result<(), ServiceError>;

    async fn find_items(&self, order_id: Uuid) -> Result<Vec<OrderItemModel>, ServiceError>;
    async fn find_item(
        &self,
        order_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<OrderItemModel>, ServiceError>;
    async fn insert_item(&self, item: OrderItemModel) -> Result<OrderItemModel, ServiceError>;
    async fn update_item(&self, item: OrderItemModel) -> Result<OrderItemModel, ServiceError>;
    async fn delete_item(&self, order_id: Uuid, product_id: Uuid) -> Result<(), ServiceError>;
}

/// sea-orm backed implementation of [`OrderStore`]
#[derive(Debug)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl OrderStore for OrderRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<OrderModel>, ServiceError> {
        Order::find_by_id(id)
            .one(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn find_all(
        &self,
        filter: OrderFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<OrderModel>, u64), ServiceError> {
        let mut query = Order::find();

        if let Some(customer_id) = filter.customer_id {
            query = query.filter(Column::CustomerId.eq(customer_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(Column::Status.eq(status.as_str()));
        }

        let paginator = query
            .order_by_desc(Column::CreatedAt)
            .paginate(self.base.get_db(), limit);

        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;

        let orders = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok((orders, total))
    }

    async fn create(&self, order: OrderModel) -> Result<OrderModel, ServiceError> {
        order
            .into_active_model()
            .insert(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn update(&self, order: OrderModel) -> Result<OrderModel, ServiceError> {
        let existing = Order::find_by_id(order.id)
            .one(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order.id)))?;

        let mut active: OrderActiveModel = existing.clone().into();
        active.customer_id = Set(order.customer_id);
        active.status = Set(order.status);
        active.total_amount = Set(order.total_amount);
        active.updated_at = Set(order.updated_at.or(Some(Utc::now())));
        active.version = Set(existing.version + 1);

        active
            .update(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = Order::delete_by_id(id)
            .exec(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Order {} not found", id)));
        }
        Ok(())
    }

    async fn find_items(&self, order_id: Uuid) -> Result<Vec<OrderItemModel>, ServiceError> {
        OrderItem::find()
            .filter(ItemColumn::OrderId.eq(order_id))
            .order_by_asc(ItemColumn::CreatedAt)
            .all(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn find_item(
        &self,
        order_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<OrderItemModel>, ServiceError> {
        OrderItem::find_by_id((order_id, product_id))
            .one(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn insert_item(&self, item: OrderItemModel) -> Result<OrderItemModel, ServiceError> {
        item.into_active_model()
            .insert(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn update_item(&self, item: OrderItemModel) -> Result<OrderItemModel, ServiceError> {
        let existing = OrderItem::find_by_id((item.order_id, item.product_id))
            .one(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Order {} has no line for product {}",
                    item.order_id, item.product_id
                ))
            })?;

        let mut active = existing.into_active_model();
        active.quantity = Set(item.quantity);
        active.unit_price = Set(item.unit_price);
        active.updated_at = Set(Some(Utc::now()));

        active
            .update(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn delete_item(&self, order_id: Uuid, product_id: Uuid) -> Result<(), ServiceError> {
        let result = OrderItem::delete_by_id((order_id, product_id))
            .exec(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Order {} has no line for product {}",
                order_id, product_id
            )));
        }
        Ok(())
    }
}

impl Repository for OrderRepository {
    fn get_db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}
