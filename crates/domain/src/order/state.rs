//! Order status machine.

use serde::{Deserialize, Serialize};

/// The status of an order.
///
/// Transitions:
/// ```text
/// Open ──┬──► Paid ──► Cancelled
///        └──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Created and awaiting payment.
    #[default]
    Open,

    /// Paid.
    Paid,

    /// Cancelled (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if the order may move from this status to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Open, OrderStatus::Paid)
                | (OrderStatus::Open, OrderStatus::Cancelled)
                | (OrderStatus::Paid, OrderStatus::Cancelled)
        )
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled)
    }

    /// Numeric code used in storage and on the wire.
    pub fn code(&self) -> i16 {
        match self {
            OrderStatus::Open => 0,
            OrderStatus::Paid => 1,
            OrderStatus::Cancelled => 2,
        }
    }

    /// Parses a numeric status code.
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(OrderStatus::Open),
            1 => Some(OrderStatus::Paid),
            2 => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "Open",
            OrderStatus::Paid => "Paid",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
