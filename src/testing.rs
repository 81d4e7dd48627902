//! In-memory port implementations shared by the service unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::entities::{order, order_item, payment};
use crate::errors::ServiceError;
use crate::models::{OrderStatus, PaymentStatus};
use crate::repositories::{OrderFilter, OrderStore, PaymentStore};
use crate::services::payment_provider::{
    ChargeStatus, CreateChargeRequest, CreateChargeResponse, PaymentProvider,
};

#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: Mutex<HashMap<Uuid, order::Model>>,
    items: Mutex<Vec<order_item::Model>>,
}

impl InMemoryOrderStore {
    pub async fn set_status(&self, order_id: Uuid, status: OrderStatus) {
        let mut orders = self.orders.lock().unwrap();
        if let Some(order) = orders.get_mut(&order_id) {
            order.status = status.as_str().to_string();
        }
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<order::Model>, ServiceError> {
        Ok(self.orders.lock().unwrap().get(&id).cloned())
    }

    async fn find_all(
        &self,
        filter: OrderFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let orders = self.orders.lock().unwrap();
        let mut matched: Vec<order::Model> = orders
            .values()
            .filter(|order| {
                filter
                    .customer_id
                    .map_or(true, |customer| order.customer_id == customer)
                    && filter
                        .status
                        .map_or(true, |status| order.status == status.as_str())
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matched.len() as u64;
        let start = ((page.saturating_sub(1)) * limit) as usize;
        let page_items = matched
            .into_iter()
            .skip(start)
            .take(limit as usize)
            .collect();
        Ok((page_items, total))
    }

    async fn create(&self, order: order::Model) -> Result<order::Model, ServiceError> {
        self.orders
            .lock()
            .unwrap()
            .insert(order.id, order.clone());
        Ok(order)
    }

    async fn update(&self, order: order::Model) -> Result<order::Model, ServiceError> {
        let mut orders = self.orders.lock().unwrap();
        let existing = orders
            .get(&order.id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order.id)))?;

        let updated = order::Model {
            version: existing.version + 1,
            ..order
        };
        orders.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        if self.orders.lock().unwrap().remove(&id).is_none() {
            return Err(ServiceError::NotFound(format!("Order {} not found", id)));
        }
        self.items.lock().unwrap().retain(|item| item.order_id != id);
        Ok(())
    }

    async fn find_items(&self, order_id: Uuid) -> Result<Vec<order_item::Model>, ServiceError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn find_item(
        &self,
        order_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<order_item::Model>, ServiceError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .find(|item| item.order_id == order_id && item.product_id == product_id)
            .cloned())
    }

    async fn insert_item(
        &self,
        item: order_item::Model,
    ) -> Result<order_item::Model, ServiceError> {
        let mut items = self.items.lock().unwrap();
        if items
            .iter()
            .any(|existing| existing.order_id == item.order_id && existing.product_id == item.product_id)
        {
            return Err(ServiceError::Conflict("duplicate order line".into()));
        }
        items.push(item.clone());
        Ok(item)
    }

    async fn update_item(
        &self,
        item: order_item::Model,
    ) -> Result<order_item::Model, ServiceError> {
        let mut items = self.items.lock().unwrap();
        let existing = items
            .iter_mut()
            .find(|candidate| {
                candidate.order_id == item.order_id && candidate.product_id == item.product_id
            })
            .ok_or_else(|| ServiceError::NotFound("order line not found".into()))?;
        existing.quantity = item.quantity;
        existing.unit_price = item.unit_price;
        existing.updated_at = Some(Utc::now());
        Ok(existing.clone())
    }

    async fn delete_item(&self, order_id: Uuid, product_id: Uuid) -> Result<(), ServiceError> {
        let mut items = self.items.lock().unwrap();
        let before = items.len();
        items.retain(|item| !(item.order_id == order_id && item.product_id == product_id));
        if items.len() == before {
            return Err(ServiceError::NotFound("order line not found".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPaymentStore {
    payments: Mutex<Vec<payment::Model>>,
}

impl InMemoryPaymentStore {
    pub fn all(&self) -> Vec<payment::Model> {
        self.payments.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn find_processing_by_order_id(
        &self,
        order_id: Uuid,
    ) -> Result<Option<payment::Model>, ServiceError> {
        Ok(self
            .payments
            .lock()
            .unwrap()
            .iter()
            .find(|payment| {
                payment.order_id == order_id
                    && payment.status == PaymentStatus::Processing.as_str()
            })
            .cloned())
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<payment::Model>, ServiceError> {
        Ok(self
            .payments
            .lock()
            .unwrap()
            .iter()
            .find(|payment| payment.external_payment_id == external_id)
            .cloned())
    }

    async fn find_latest_by_order_id(
        &self,
        order_id: Uuid,
    ) -> Result<Option<payment::Model>, ServiceError> {
        let payments = self.payments.lock().unwrap();
        Ok(payments
            .iter()
            .filter(|payment| payment.order_id == order_id)
            .max_by_key(|payment| payment.created_at)
            .cloned())
    }

    async fn create(&self, payment: payment::Model) -> Result<payment::Model, ServiceError> {
        let mut payments = self.payments.lock().unwrap();
        if payment.status == PaymentStatus::Processing.as_str()
            && payments.iter().any(|existing| {
                existing.order_id == payment.order_id && existing.status == payment.status
            })
        {
            // mirrors the unique (order_id, status) index
            return Err(ServiceError::Conflict(
                "order already has a processing payment".into(),
            ));
        }
        payments.push(payment.clone());
        Ok(payment)
    }

    async fn update_status(
        &self,
        status: PaymentStatus,
        external_id: &str,
    ) -> Result<payment::Model, ServiceError> {
        let mut payments = self.payments.lock().unwrap();
        let payment = payments
            .iter_mut()
            .find(|payment| payment.external_payment_id == external_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "No payment found for external reference {}",
                    external_id
                ))
            })?;
        payment.status = status.as_str().to_string();
        payment.updated_at = Some(Utc::now());
        Ok(payment.clone())
    }
}

/// Scriptable provider double that counts charge calls.
pub struct StubPaymentProvider {
    pub create_calls: AtomicUsize,
    pub fail_create: bool,
    pub lookup_result: Mutex<Option<ChargeStatus>>,
    pub last_charge_request: Mutex<Option<CreateChargeRequest>>,
}

impl Default for StubPaymentProvider {
    fn default() -> Self {
        Self {
            create_calls: AtomicUsize::new(0),
            fail_create: false,
            lookup_result: Mutex::new(None),
            last_charge_request: Mutex::new(None),
        }
    }
}

impl StubPaymentProvider {
    pub fn failing() -> Self {
        Self {
            fail_create: true,
            ..Self::default()
        }
    }

    pub fn with_lookup(status: PaymentStatus, external_reference: &str) -> Self {
        let stub = Self::default();
        *stub.lookup_result.lock().unwrap() = Some(ChargeStatus {
            status,
            external_reference: external_reference.to_string(),
        });
        stub
    }

    pub fn charge_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentProvider for StubPaymentProvider {
    async fn create_charge(
        &self,
        request: &CreateChargeRequest,
    ) -> Result<CreateChargeResponse, ServiceError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_charge_request.lock().unwrap() = Some(request.clone());

        if self.fail_create {
            return Err(ServiceError::ExternalServiceError(
                "provider unavailable".into(),
            ));
        }

        Ok(CreateChargeResponse {
            in_store_order_id: format!("ext-{}", request.external_reference),
            qr_data: "00020101021243650016COM.QUICKBITE0136qr-payload".into(),
        })
    }

    async fn lookup_status(
        &self,
        _resource: &str,
        _topic: &str,
    ) -> Result<ChargeStatus, ServiceError> {
        self.lookup_result
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ServiceError::ExternalApiError("no lookup result scripted".into()))
    }
}
