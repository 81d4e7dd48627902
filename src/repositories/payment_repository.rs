use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::payment::{Column, Entity as Payment, Model as PaymentModel};
use crate::errors::ServiceError;
use crate::models::PaymentStatus;
use crate::repositories::Repository;

use super::BaseRepository;

/// Persistence port for payments.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// The in-flight payment for an order, if any. `create` re-checks this
    /// inside its insert transaction, so callers treat this as a fast path,
    /// not the guard itself.
    async fn find_processing_by_order_id(
        &self,
        order_id: Uuid,
    ) -> Result<Option<PaymentModel>, ServiceError>;
    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<PaymentModel>, ServiceError>;
    async fn find_latest_by_order_id(
        &self,
        order_id: Uuid,
    ) -> Result<Option<PaymentModel>, ServiceError>;
    async fn create(&self, payment: PaymentModel) -> Result<PaymentModel, ServiceError>;
    /// Updates the payment addressed by the provider's reference id; fails with
    /// not-found when no such payment exists (webhooks never create payments).
    async fn update_status(
        &self,
        status: PaymentStatus,
        external_id: &str,
    ) -> Result<PaymentModel, ServiceError>;
}

/// sea-orm backed implementation of [`PaymentStore`]
#[derive(Debug)]
pub struct PaymentRepository {
    base: BaseRepository,
}

impl PaymentRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl PaymentStore for PaymentRepository {
    async fn find_processing_by_order_id(
        &self,
        order_id: Uuid,
    ) -> Result<Option<PaymentModel>, ServiceError> {
        Payment::find()
            .filter(Column::OrderId.eq(order_id))
            .filter(Column::Status.eq(PaymentStatus::Processing.as_str()))
            .one(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<PaymentModel>, ServiceError> {
        Payment::find()
            .filter(Column::ExternalPaymentId.eq(external_id))
            .one(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn find_latest_by_order_id(
        &self,
        order_id: Uuid,
    ) -> Result<Option<PaymentModel>, ServiceError> {
        Payment::find()
            .filter(Column::OrderId.eq(order_id))
            .order_by_desc(Column::CreatedAt)
            .one(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn create(&self, payment: PaymentModel) -> Result<PaymentModel, ServiceError> {
        // Conditional insert: the at-most-one-PROCESSING-payment-per-order
        // invariant is re-checked inside the transaction, not only in the
        // workflow's fast path.
        let txn = self
            .base
            .get_db()
            .begin()
            .await
            .map_err(ServiceError::DatabaseError)?;

        if payment.status == PaymentStatus::Processing.as_str() {
            let in_flight = Payment::find()
                .filter(Column::OrderId.eq(payment.order_id))
                .filter(Column::Status.eq(PaymentStatus::Processing.as_str()))
                .one(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?;

            if in_flight.is_some() {
                return Err(ServiceError::Conflict(format!(
                    "Order {} already has a payment in processing",
                    payment.order_id
                )));
            }
        }

        let created = payment
            .into_active_model()
            .insert(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        Ok(created)
    }

    async fn update_status(
        &self,
        status: PaymentStatus,
        external_id: &str,
    ) -> Result<PaymentModel, ServiceError> {
        let payment = self
            .find_by_external_id(external_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "No payment found for external reference {}",
                    external_id
                ))
            })?;

        let mut active = payment.into_active_model();
        active.status = Set(status.as_str().to_string());
        active.updated_at = Set(Some(Utc::now()));

        active
            .update(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)
    }
}

impl Repository for PaymentRepository {
    fn get_db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}
