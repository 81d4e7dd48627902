use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, instrument};

use crate::errors::ServiceError;
use crate::models::PaymentStatus;

/// Provider-agnostic charge request built from an order at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChargeRequest {
    pub external_reference: String,
    pub total_amount: Decimal,
    pub items: Vec<ChargeItem>,
    pub title: String,
    pub description: String,
    pub notification_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeItem {
    pub category: String,
    pub title: String,
    pub description: String,
    pub unit_price: Decimal,
    pub quantity: u64,
    pub unit_measure: String,
    pub total_amount: Decimal,
}

/// Provider response to a created charge: its reference id plus the QR payload
/// shown to the customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChargeResponse {
    pub in_store_order_id: String,
    pub qr_data: String,
}

/// Authoritative charge state resolved from a webhook notification.
#[derive(Debug, Clone)]
pub struct ChargeStatus {
    pub status: PaymentStatus,
    pub external_reference: String,
}

#[derive(Debug, Deserialize)]
struct ChargeStatusResponse {
    status: String,
    external_reference: String,
}

/// External payment provider port.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_charge(
        &self,
        request: &CreateChargeRequest,
    ) -> Result<CreateChargeResponse, ServiceError>;

    /// Resolves the authoritative status for a notification resource. May call
    /// back into the provider's API.
    async fn lookup_status(
        &self,
        resource: &str,
        topic: &str,
    ) -> Result<ChargeStatus, ServiceError>;
}

/// reqwest-backed provider client. Timeout is enforced by the client; retries,
/// if any, belong here and not in the payment workflows.
#[derive(Debug, Clone)]
pub struct HttpPaymentProvider {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpPaymentProvider {
    pub fn new(base_url: String, token: String, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ServiceError::InternalError(format!("failed to build provider HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }
}

#[async_trait]
impl PaymentProvider for HttpPaymentProvider {
    #[instrument(skip(self, request), fields(external_reference = %request.external_reference))]
    async fn create_charge(
        &self,
        request: &CreateChargeRequest,
    ) -> Result<CreateChargeResponse, ServiceError> {
        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "provider charge request failed");
                ServiceError::ExternalServiceError(format!("failed to create charge: {}", e))
            })?;

        if response.status() != StatusCode::CREATED {
            error!(status = %response.status(), "provider rejected charge request");
            return Err(ServiceError::ExternalApiError(format!(
                "provider returned status {}",
                response.status()
            )));
        }

        response.json::<CreateChargeResponse>().await.map_err(|e| {
            ServiceError::ExternalApiError(format!("invalid charge response: {}", e))
        })
    }

    #[instrument(skip(self))]
    async fn lookup_status(
        &self,
        resource: &str,
        topic: &str,
    ) -> Result<ChargeStatus, ServiceError> {
        let url = format!("{}/{}", self.base_url, resource);
        let response = self
            .client
            .get(&url)
            .query(&[("topic", topic)])
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, resource, "provider status lookup failed");
                ServiceError::ExternalServiceError(format!("failed to look up charge: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(ServiceError::ExternalApiError(format!(
                "provider returned status {}",
                response.status()
            )));
        }

        let body = response.json::<ChargeStatusResponse>().await.map_err(|e| {
            ServiceError::ExternalApiError(format!("invalid status response: {}", e))
        })?;

        let status = PaymentStatus::parse(&body.status).ok_or_else(|| {
            ServiceError::ExternalApiError(format!("unknown provider status '{}'", body.status))
        })?;

        Ok(ChargeStatus {
            status,
            external_reference: body.external_reference,
        })
    }
}
