use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::OrderStatus;

/// Status of a charge attempt mirrored from the external payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Processing,
    Confirmed,
    Failed,
    Canceled,
}

impl PaymentStatus {
    pub fn parse(value: &str) -> Option<PaymentStatus> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PROCESSING" => Some(PaymentStatus::Processing),
            "CONFIRMED" => Some(PaymentStatus::Confirmed),
            "FAILED" => Some(PaymentStatus::Failed),
            "CANCELED" | "CANCELLED" => Some(PaymentStatus::Canceled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Confirmed => "CONFIRMED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Canceled => "CANCELED",
        }
    }

    /// Order progression implied by this payment status.
    ///
    /// A confirmed charge moves the order into the kitchen queue; a failed or
    /// canceled charge reopens it so the customer can retry checkout. Both
    /// targets are legal from PENDING in the order transition table.
    pub fn order_status_effect(&self) -> Option<OrderStatus> {
        match self {
            PaymentStatus::Confirmed => Some(OrderStatus::Received),
            PaymentStatus::Failed | PaymentStatus::Canceled => Some(OrderStatus::Open),
            PaymentStatus::Processing => None,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
