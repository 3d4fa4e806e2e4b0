//! Named-lock derivation.
//!
//! Writers touching the same logical resource must derive the same name,
//! so names are built only here.

use common::{OrderId, ProductId, UserId};

pub fn user(id: UserId) -> String {
    format!("user_{id}")
}

pub fn user_login(login: &str) -> String {
    format!("user_login_{login}")
}

pub fn user_email(email: &str) -> String {
    format!("user_email_{email}")
}

pub fn user_balance(user_id: UserId) -> String {
    format!("user_balance_{user_id}")
}

pub fn product(id: ProductId) -> String {
    format!("product_{id}")
}

pub fn product_name(name: &str) -> String {
    format!("product_name_{name}")
}

pub fn order(id: OrderId) -> String {
    format!("order_{id}")
}

/// Serializes deduplicated notification writes for one order.
pub fn notification_order(order_id: OrderId) -> String {
    format!("notification_order_{order_id}")
}
