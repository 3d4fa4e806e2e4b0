//! Shared types used across the user, account, product, order and
//! notification services.

pub mod time;
pub mod types;

pub use types::{NotificationId, OrderId, ProductId, UserId};
