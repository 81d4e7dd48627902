use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::OrderStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub customer_id: Uuid,
    pub status: String,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

impl Model {
    /// Returns the parsed lifecycle status. A row that fails to parse was
    /// written outside the update path and is surfaced as an internal error.
    pub fn order_status(&self) -> Result<OrderStatus, ServiceError> {
        OrderStatus::parse(&self.status).ok_or_else(|| {
            ServiceError::InternalError(format!(
                "order {} carries unknown status '{}'",
                self.id, self.status
            ))
        })
    }

    /// Applies a customer/status update, enforcing the transition table before
    /// anything is persisted.
    ///
    /// Customer reassignment is not supported through this path. A missing
    /// status leaves the current one untouched, and `new_status == current` is
    /// an accepted no-op that skips the table lookup. Line items are never
    /// modified here.
    pub fn apply_update(
        &mut self,
        customer_id: Option<Uuid>,
        new_status: Option<OrderStatus>,
        staff_id: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        if let Some(customer_id) = customer_id {
            if customer_id != self.customer_id {
                return Err(ServiceError::InvalidInput(
                    "order cannot be reassigned to another customer".into(),
                ));
            }
        }

        if let Some(target) = new_status {
            let current = self.order_status()?;
            if target != current {
                if !current.can_transition_to(target) {
                    return Err(ServiceError::InvalidInput(format!(
                        "cannot transition order from {} to {}",
                        current, target
                    )));
                }
                if target.requires_staff_actor() && staff_id.is_none() {
                    return Err(ServiceError::InvalidInput(format!(
                        "transition to {} requires a staff actor",
                        target
                    )));
                }
                self.status = target.as_str().to_string();
            }
        }

        self.updated_at = Some(Utc::now());
        Ok(())
    }
}

/// Sum of line-item subtotals; the total bill is derived here and nowhere else.
pub fn total_from_items(items: &[super::order_item::Model]) -> Decimal {
    items.iter().map(|item| item.subtotal()).sum()
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        Ok(self)
    }
}
