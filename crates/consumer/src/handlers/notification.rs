//! Handlers of the notification service.

use std::sync::Arc;

use application::NotificationService;
use application::integration::OrderCreatedPayload;
use async_trait::async_trait;
use domain::order::OrderCreated;

use crate::delivery::Delivery;
use crate::error::Result;
use crate::handler::{EventHandler, HandlerRegistry};

pub const ORDER_CREATED_MESSAGE: &str = "Order created";

/// Tells the buyer their order was placed. Creation is idempotent per
/// order, user and message, so redeliveries add nothing.
pub struct OrderCreatedHandler {
    notifications: Arc<dyn NotificationService>,
}

#[async_trait]
impl EventHandler for OrderCreatedHandler {
    async fn handle(&self, delivery: &Delivery) -> Result<()> {
        let payload: OrderCreatedPayload = delivery.decode()?;
        self.notifications
            .create_notification(
                payload.order_id,
                payload.user_id,
                ORDER_CREATED_MESSAGE.to_string(),
            )
            .await?;
        Ok(())
    }
}

pub fn notification_handlers(notifications: Arc<dyn NotificationService>) -> HandlerRegistry {
    HandlerRegistry::new().register(
        OrderCreated::EVENT_TYPE,
        OrderCreatedHandler { notifications },
    )
}
