//! Handler registries of the consuming services.

mod notification;
mod order;
mod user;

pub use notification::{ORDER_CREATED_MESSAGE, OrderCreatedHandler, notification_handlers};
pub use order::{
    LocalProductCreatedHandler, LocalProductDeletedHandler, LocalProductUpdatedHandler,
    LocalUserCreatedHandler, LocalUserDeletedHandler, order_handlers,
};
pub use user::{UserDeletedHandler, user_handlers, workflow_id};
