use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle status of an order.
///
/// The transition graph is a closed, static table: an order opens, is paid
/// (PENDING), lands in the kitchen (RECEIVED → PREPARING → READY) and is handed
/// over (COMPLETED). CANCELLED and COMPLETED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Open,
    Cancelled,
    Pending,
    Received,
    Preparing,
    Ready,
    Completed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Open,
        OrderStatus::Cancelled,
        OrderStatus::Pending,
        OrderStatus::Received,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Completed,
    ];

    /// Parses the canonical (case-insensitive) form; unknown values yield `None`
    /// and must be rejected at the boundary, never persisted.
    pub fn parse(value: &str) -> Option<OrderStatus> {
        match value.trim().to_ascii_uppercase().as_str() {
            "OPEN" => Some(OrderStatus::Open),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            "PENDING" => Some(OrderStatus::Pending),
            "RECEIVED" => Some(OrderStatus::Received),
            "PREPARING" => Some(OrderStatus::Preparing),
            "READY" => Some(OrderStatus::Ready),
            "COMPLETED" => Some(OrderStatus::Completed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "OPEN",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Pending => "PENDING",
            OrderStatus::Received => "RECEIVED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Ready => "READY",
            OrderStatus::Completed => "COMPLETED",
        }
    }

    /// Statuses reachable from `self`. No self-loops; terminal statuses map to
    /// the empty slice.
    pub fn allowed_transitions(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Open => &[OrderStatus::Cancelled, OrderStatus::Pending],
            OrderStatus::Pending => &[OrderStatus::Open, OrderStatus::Received],
            OrderStatus::Received => &[OrderStatus::Preparing],
            OrderStatus::Preparing => &[OrderStatus::Ready],
            OrderStatus::Ready => &[OrderStatus::Completed],
            OrderStatus::Cancelled | OrderStatus::Completed => &[],
        }
    }

    /// True iff `to` appears in the static adjacency list for `self`.
    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }

    /// Kitchen and counter transitions must be attributable to an employee.
    pub fn requires_staff_actor(&self) -> bool {
        matches!(
            self,
            OrderStatus::Preparing | OrderStatus::Ready | OrderStatus::Completed
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
