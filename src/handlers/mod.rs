pub mod common;
pub mod orders;
pub mod payment_webhooks;
pub mod payments;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::repositories::{OrderRepository, PaymentRepository};
use crate::services::orders::OrderService;
use crate::services::payment_provider::HttpPaymentProvider;
use crate::services::payments::PaymentService;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
}

impl AppServices {
    /// Wires repositories and the provider client from configuration.
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        config: &AppConfig,
    ) -> Result<Self, ServiceError> {
        let order_repository = Arc::new(OrderRepository::new(db_pool.clone()));
        let payment_repository = Arc::new(PaymentRepository::new(db_pool));

        let provider = Arc::new(HttpPaymentProvider::new(
            config.payment_provider_url.clone(),
            config.payment_provider_token.clone(),
            config.payment_provider_timeout(),
        )?);

        let orders = Arc::new(OrderService::new(
            order_repository.clone(),
            Some(event_sender.clone()),
        ));
        let payments = Arc::new(PaymentService::new(
            order_repository,
            payment_repository,
            provider,
            config.payment_notification_url.clone(),
            Some(event_sender),
        ));

        Ok(Self { orders, payments })
    }
}
