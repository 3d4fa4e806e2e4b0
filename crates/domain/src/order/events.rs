use chrono::{DateTime, Utc};
use common::{OrderId, UserId};

use super::{OrderItem, OrderStatus};

/// An order was placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCreated {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub total_price: i64,
    pub created_at: DateTime<Utc>,
}

domain_event!(OrderCreated, "order_created");

/// The status of an order changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderUpdated {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub updated_at: DateTime<Utc>,
}

domain_event!(OrderUpdated, "order_updated");
