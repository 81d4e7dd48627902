use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{order, order_item, payment},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{OrderStatus, PaymentStatus},
    repositories::{OrderStore, PaymentStore},
    services::payment_provider::{ChargeItem, CreateChargeRequest, PaymentProvider},
};

const CHARGE_TITLE: &str = "QuickBite - Product Order";
const CHARGE_DESCRIPTION: &str = "Purchases made at the QuickBite counter";
const CHARGE_ITEM_CATEGORY: &str = "marketplace";
const CHARGE_ITEM_UNIT: &str = "unit";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub status: String,
    pub external_payment_id: String,
    pub qr_data: String,
}

/// Service reconciling orders against the external payment provider
#[derive(Clone)]
pub struct PaymentService {
    orders: Arc<dyn OrderStore>,
    payments: Arc<dyn PaymentStore>,
    provider: Arc<dyn PaymentProvider>,
    notification_url: String,
    event_sender: Option<Arc<EventSender>>,
}

impl PaymentService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        payments: Arc<dyn PaymentStore>,
        provider: Arc<dyn PaymentProvider>,
        notification_url: String,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            orders,
            payments,
            provider,
            notification_url,
            event_sender,
        }
    }

    /// Originates a payment for an order.
    ///
    /// Checkout retries are idempotent: while a PROCESSING payment exists for
    /// the order it is returned unchanged and the provider is not charged a
    /// second time. On success the order moves to PENDING (awaiting payment).
    ///
    /// No rollback is attempted on late failures: a persisted PROCESSING
    /// payment whose order update failed is reconciled by the webhook or an
    /// explicit retry, not by this workflow.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn create_payment(&self, order_id: Uuid) -> Result<PaymentResponse, ServiceError> {
        if let Some(existing) = self.payments.find_processing_by_order_id(order_id).await? {
            info!(payment_id = %existing.id, "Returning in-flight payment for checkout retry");
            return Ok(model_to_response(existing));
        }

        let mut order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = self.orders.find_items(order_id).await?;
        if items.is_empty() {
            return Err(ServiceError::NotFound(format!(
                "Order {} has no products to charge",
                order_id
            )));
        }

        let total = order::total_from_items(&items);
        let payload = self.build_charge_request(&order, &items, total);

        let charge = self.provider.create_charge(&payload).await?;

        let now = Utc::now();
        let payment = self
            .payments
            .create(payment::Model {
                id: Uuid::new_v4(),
                order_id,
                status: PaymentStatus::Processing.as_str().to_string(),
                external_payment_id: charge.in_store_order_id,
                qr_data: charge.qr_data,
                created_at: now,
                updated_at: Some(now),
            })
            .await?;

        let old_status = order.status.clone();
        order.apply_update(None, Some(OrderStatus::Pending), None)?;
        order.total_amount = total;
        let order = self.orders.update(order).await?;

        info!(payment_id = %payment.id, external_payment_id = %payment.external_payment_id, "Payment initiated");

        self.emit(Event::PaymentInitiated {
            payment_id: payment.id,
            order_id,
        })
        .await;
        self.emit(Event::OrderStatusChanged {
            order_id,
            old_status,
            new_status: order.status,
        })
        .await;

        Ok(model_to_response(payment))
    }

    /// Applies a provider notification.
    ///
    /// The raw resource/topic pair is resolved through the provider to the
    /// authoritative status and payment reference; the local payment row is
    /// updated by that reference (never created), and the implied order
    /// progression is forwarded through the aggregate update path.
    #[instrument(skip(self))]
    pub async fn process_notification(
        &self,
        resource: &str,
        topic: &str,
    ) -> Result<PaymentResponse, ServiceError> {
        let charge = self.provider.lookup_status(resource, topic).await?;

        let payment = self
            .payments
            .update_status(charge.status, &charge.external_reference)
            .await?;

        info!(
            payment_id = %payment.id,
            order_id = %payment.order_id,
            status = %payment.status,
            "Payment status updated from provider notification"
        );

        if let Some(target) = charge.status.order_status_effect() {
            self.forward_order_effect(payment.order_id, target).await?;
        }

        self.emit(Event::PaymentStatusChanged {
            payment_id: payment.id,
            order_id: payment.order_id,
            new_status: payment.status.clone(),
        })
        .await;

        Ok(model_to_response(payment))
    }

    /// Latest payment recorded for an order
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order_payment(
        &self,
        order_id: Uuid,
    ) -> Result<PaymentResponse, ServiceError> {
        let payment = self
            .payments
            .find_latest_by_order_id(order_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Order {} has no payments", order_id))
            })?;
        Ok(model_to_response(payment))
    }

    /// Moves the order along when a payment outcome implies it. Replayed
    /// notifications (order already past the target) are tolerated: step 2 has
    /// already been applied idempotently, so an unreachable target is logged
    /// and skipped rather than failing the webhook.
    async fn forward_order_effect(
        &self,
        order_id: Uuid,
        target: OrderStatus,
    ) -> Result<(), ServiceError> {
        let mut order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let current = order.order_status()?;
        if current != target && !current.can_transition_to(target) {
            warn!(
                %order_id,
                current = %current,
                target = %target,
                "Skipping order effect of replayed or out-of-order notification"
            );
            return Ok(());
        }

        let old_status = order.status.clone();
        order.apply_update(None, Some(target), None)?;
        let order = self.orders.update(order).await?;

        if order.status != old_status {
            self.emit(Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status: order.status,
            })
            .await;
        }
        Ok(())
    }

    fn build_charge_request(
        &self,
        order: &order::Model,
        items: &[order_item::Model],
        total: Decimal,
    ) -> CreateChargeRequest {
        let charge_items = items
            .iter()
            .map(|item| ChargeItem {
                category: CHARGE_ITEM_CATEGORY.to_string(),
                title: item.product_name.clone(),
                description: item.product_description.clone().unwrap_or_default(),
                unit_price: item.unit_price,
                quantity: item.quantity.max(0) as u64,
                unit_measure: CHARGE_ITEM_UNIT.to_string(),
                total_amount: item.subtotal(),
            })
            .collect();

        CreateChargeRequest {
            external_reference: order.id.to_string(),
            total_amount: total,
            items: charge_items,
            title: CHARGE_TITLE.to_string(),
            description: CHARGE_DESCRIPTION.to_string(),
            notification_url: self.notification_url.clone(),
        }
    }

    async fn emit(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "Failed to send payment event");
            }
        }
    }
}

fn model_to_response(model: payment::Model) -> PaymentResponse {
    PaymentResponse {
        id: model.id,
        order_id: model.order_id,
        status: model.status,
        external_payment_id: model.external_payment_id,
        qr_data: model.qr_data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryOrderStore, InMemoryPaymentStore, StubPaymentProvider};
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    const NOTIFY_URL: &str = "https://api.quickbite.test/api/v1/payments/webhook";

    struct Fixture {
        orders: Arc<InMemoryOrderStore>,
        payments: Arc<InMemoryPaymentStore>,
        provider: Arc<StubPaymentProvider>,
        service: PaymentService,
    }

    fn fixture(provider: StubPaymentProvider) -> Fixture {
        let orders = Arc::new(InMemoryOrderStore::default());
        let payments = Arc::new(InMemoryPaymentStore::default());
        let provider = Arc::new(provider);
        let service = PaymentService::new(
            orders.clone(),
            payments.clone(),
            provider.clone(),
            NOTIFY_URL.to_string(),
            None,
        );
        Fixture {
            orders,
            payments,
            provider,
            service,
        }
    }

    async fn seed_order(fixture: &Fixture, status: OrderStatus) -> Uuid {
        let now = Utc::now();
        let order = order::Model {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            status: status.as_str().to_string(),
            total_amount: Decimal::ZERO,
            created_at: now,
            updated_at: Some(now),
            version: 1,
        };
        let id = order.id;
        fixture.orders.create(order).await.unwrap();
        id
    }

    async fn seed_item(fixture: &Fixture, order_id: Uuid, name: &str, quantity: i32, price: Decimal) {
        let now = Utc::now();
        fixture
            .orders
            .insert_item(order_item::Model {
                order_id,
                product_id: Uuid::new_v4(),
                product_name: name.into(),
                product_description: Some(format!("{} (combo)", name)),
                quantity,
                unit_price: price,
                created_at: now,
                updated_at: Some(now),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn checkout_builds_charge_and_moves_order_to_pending() {
        let fx = fixture(StubPaymentProvider::default());
        let order_id = seed_order(&fx, OrderStatus::Open).await;
        seed_item(&fx, order_id, "Burger", 2, dec!(10.00)).await;
        seed_item(&fx, order_id, "Soda", 1, dec!(5.00)).await;

        let payment = fx.service.create_payment(order_id).await.unwrap();

        assert_eq!(payment.status, "PROCESSING");
        assert_eq!(payment.order_id, order_id);
        assert!(!payment.external_payment_id.is_empty());

        let request = fx.provider.last_charge_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.total_amount, dec!(25.00));
        assert_eq!(request.items.len(), 2);
        assert_eq!(request.external_reference, order_id.to_string());
        assert_eq!(request.notification_url, NOTIFY_URL);

        let order = fx.orders.find_by_id(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, "PENDING");
        assert_eq!(order.total_amount, dec!(25.00));
    }

    #[tokio::test]
    async fn checkout_retry_returns_same_payment_and_charges_once() {
        let fx = fixture(StubPaymentProvider::default());
        let order_id = seed_order(&fx, OrderStatus::Open).await;
        seed_item(&fx, order_id, "Burger", 1, dec!(10.00)).await;

        let first = fx.service.create_payment(order_id).await.unwrap();
        let second = fx.service.create_payment(order_id).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.external_payment_id, second.external_payment_id);
        assert_eq!(fx.provider.charge_calls(), 1);
        assert_eq!(fx.payments.all().len(), 1);
    }

    #[tokio::test]
    async fn checkout_of_empty_order_fails_without_charging() {
        let fx = fixture(StubPaymentProvider::default());
        let order_id = seed_order(&fx, OrderStatus::Open).await;

        let err = fx.service.create_payment(order_id).await.unwrap_err();

        assert_matches!(err, ServiceError::NotFound(_));
        assert_eq!(fx.provider.charge_calls(), 0);
        assert!(fx.payments.all().is_empty());
    }

    #[tokio::test]
    async fn checkout_of_missing_order_is_not_found() {
        let fx = fixture(StubPaymentProvider::default());

        let err = fx.service.create_payment(Uuid::new_v4()).await.unwrap_err();
        assert_matches!(err, ServiceError::NotFound(_));
        assert_eq!(fx.provider.charge_calls(), 0);
    }

    #[tokio::test]
    async fn provider_failure_leaves_no_payment_or_order_mutation() {
        let fx = fixture(StubPaymentProvider::failing());
        let order_id = seed_order(&fx, OrderStatus::Open).await;
        seed_item(&fx, order_id, "Burger", 1, dec!(10.00)).await;

        let err = fx.service.create_payment(order_id).await.unwrap_err();

        assert_matches!(err, ServiceError::ExternalServiceError(_));
        assert!(fx.payments.all().is_empty());
        let order = fx.orders.find_by_id(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, "OPEN");
    }

    #[tokio::test]
    async fn confirmed_notification_advances_order_to_received() {
        let fx = fixture(StubPaymentProvider::with_lookup(
            PaymentStatus::Confirmed,
            "ext-abc",
        ));
        let order_id = seed_order(&fx, OrderStatus::Pending).await;
        let now = Utc::now();
        fx.payments
            .create(payment::Model {
                id: Uuid::new_v4(),
                order_id,
                status: PaymentStatus::Processing.as_str().to_string(),
                external_payment_id: "ext-abc".into(),
                qr_data: "qr".into(),
                created_at: now,
                updated_at: Some(now),
            })
            .await
            .unwrap();

        let payment = fx
            .service
            .process_notification("resource-1", "merchant_order")
            .await
            .unwrap();

        assert_eq!(payment.status, "CONFIRMED");
        let order = fx.orders.find_by_id(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, "RECEIVED");
    }

    #[tokio::test]
    async fn failed_notification_reopens_the_order() {
        let fx = fixture(StubPaymentProvider::with_lookup(
            PaymentStatus::Failed,
            "ext-fail",
        ));
        let order_id = seed_order(&fx, OrderStatus::Pending).await;
        let now = Utc::now();
        fx.payments
            .create(payment::Model {
                id: Uuid::new_v4(),
                order_id,
                status: PaymentStatus::Processing.as_str().to_string(),
                external_payment_id: "ext-fail".into(),
                qr_data: "qr".into(),
                created_at: now,
                updated_at: Some(now),
            })
            .await
            .unwrap();

        let payment = fx
            .service
            .process_notification("resource-2", "merchant_order")
            .await
            .unwrap();

        assert_eq!(payment.status, "FAILED");
        let order = fx.orders.find_by_id(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, "OPEN");
    }

    #[tokio::test]
    async fn notification_for_unknown_payment_is_not_found_and_touches_no_order() {
        let fx = fixture(StubPaymentProvider::with_lookup(
            PaymentStatus::Confirmed,
            "ext-ghost",
        ));
        let order_id = seed_order(&fx, OrderStatus::Pending).await;

        let err = fx
            .service
            .process_notification("resource-3", "merchant_order")
            .await
            .unwrap_err();

        assert_matches!(err, ServiceError::NotFound(_));
        let order = fx.orders.find_by_id(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, "PENDING");
    }

    #[tokio::test]
    async fn replayed_confirmation_does_not_fail_once_order_moved_on() {
        let fx = fixture(StubPaymentProvider::with_lookup(
            PaymentStatus::Confirmed,
            "ext-replay",
        ));
        let order_id = seed_order(&fx, OrderStatus::Preparing).await;
        let now = Utc::now();
        fx.payments
            .create(payment::Model {
                id: Uuid::new_v4(),
                order_id,
                status: PaymentStatus::Confirmed.as_str().to_string(),
                external_payment_id: "ext-replay".into(),
                qr_data: "qr".into(),
                created_at: now,
                updated_at: Some(now),
            })
            .await
            .unwrap();

        let payment = fx
            .service
            .process_notification("resource-4", "merchant_order")
            .await
            .unwrap();

        assert_eq!(payment.status, "CONFIRMED");
        let order = fx.orders.find_by_id(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, "PREPARING");
    }

    #[tokio::test]
    async fn latest_payment_lookup_surfaces_not_found() {
        let fx = fixture(StubPaymentProvider::default());
        let err = fx
            .service
            .get_order_payment(Uuid::new_v4())
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::NotFound(_));
    }
}
