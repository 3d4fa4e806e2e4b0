//! Value objects for the order aggregate.

use common::{ProductId, UserId};
use serde::{Deserialize, Serialize};

/// A requested order line, before prices are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// A priced order line. Immutable once the order exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: i32,
    /// Unit price in minor currency units at the time of ordering.
    pub price: i64,
}

impl OrderItem {
    /// Returns `quantity × price`, or `None` on overflow.
    pub fn line_total(&self) -> Option<i64> {
        i64::from(self.quantity).checked_mul(self.price)
    }
}

/// Order-side replica of a user, kept from user events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalUser {
    pub user_id: UserId,
}

/// Order-side replica of a product, kept from product events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalProduct {
    pub product_id: ProductId,
    pub name: String,
    pub price: i64,
}

/// A replica row, or the tombstone a delete leaves behind.
///
/// Ids are never reused, so a tombstone is final: a create redelivered after
/// the delete finds it and changes nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replica<T> {
    Live(T),
    Deleted,
}

impl<T> Replica<T> {
    /// Returns the row unless it has been deleted.
    pub fn live(self) -> Option<T> {
        match self {
            Self::Live(row) => Some(row),
            Self::Deleted => None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_total_multiplies_quantity_and_price() {
        let item = OrderItem {
            product_id: ProductId::new(),
            quantity: 3,
            price: 250,
        };
        assert_eq!(item.line_total(), Some(750));
    }

    #[test]
    fn line_total_detects_overflow() {
        let item = OrderItem {
            product_id: ProductId::new(),
            quantity: 2,
            price: i64::MAX,
        };
        assert_eq!(item.line_total(), None);
    }
}
