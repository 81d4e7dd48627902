use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::PaymentStatus;

/// A charge attempt against an order, mirrored from the external provider.
/// Created in PROCESSING; only the webhook workflow moves it further.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,
    pub status: String,
    #[sea_orm(column_type = "Text")]
    pub external_payment_id: String,
    #[sea_orm(column_type = "Text")]
    pub qr_data: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn payment_status(&self) -> Result<PaymentStatus, ServiceError> {
        PaymentStatus::parse(&self.status).ok_or_else(|| {
            ServiceError::InternalError(format!(
                "payment {} carries unknown status '{}'",
                self.id, self.status
            ))
        })
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id",
        on_delete = "Cascade"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
