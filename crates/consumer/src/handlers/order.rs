//! Handlers of the order service: keep its local user and product replicas
//! in step with the owning services.

use std::sync::Arc;

use application::OrderService;
use application::integration::{
    ProductCreatedPayload, ProductDeletedPayload, ProductUpdatedPayload, UserCreatedPayload,
    UserDeletedPayload,
};
use async_trait::async_trait;
use domain::product::{ProductCreated, ProductDeleted, ProductUpdated};
use domain::user::{UserCreated, UserDeleted};

use crate::delivery::Delivery;
use crate::error::Result;
use crate::handler::{EventHandler, HandlerRegistry};

pub struct LocalUserCreatedHandler {
    orders: Arc<dyn OrderService>,
}

#[async_trait]
impl EventHandler for LocalUserCreatedHandler {
    async fn handle(&self, delivery: &Delivery) -> Result<()> {
        let payload: UserCreatedPayload = delivery.decode()?;
        self.orders.store_local_user(payload.user_id).await?;
        Ok(())
    }
}

/// Soft and hard deletes both withdraw the user from ordering.
pub struct LocalUserDeletedHandler {
    orders: Arc<dyn OrderService>,
}

#[async_trait]
impl EventHandler for LocalUserDeletedHandler {
    async fn handle(&self, delivery: &Delivery) -> Result<()> {
        let payload: UserDeletedPayload = delivery.decode()?;
        self.orders.delete_local_user(payload.user_id).await?;
        Ok(())
    }
}

pub struct LocalProductCreatedHandler {
    orders: Arc<dyn OrderService>,
}

#[async_trait]
impl EventHandler for LocalProductCreatedHandler {
    async fn handle(&self, delivery: &Delivery) -> Result<()> {
        let payload: ProductCreatedPayload = delivery.decode()?;
        self.orders
            .store_local_product(payload.product_id, payload.name, payload.price)
            .await?;
        Ok(())
    }
}

/// Only name and price are replicated; description changes are ignored.
pub struct LocalProductUpdatedHandler {
    orders: Arc<dyn OrderService>,
}

#[async_trait]
impl EventHandler for LocalProductUpdatedHandler {
    async fn handle(&self, delivery: &Delivery) -> Result<()> {
        let payload: ProductUpdatedPayload = delivery.decode()?;
        let Some(fields) = payload.updated_fields else {
            return Ok(());
        };
        if fields.name.is_none() && fields.price.is_none() {
            return Ok(());
        }
        self.orders
            .update_local_product(payload.product_id, fields.name, fields.price)
            .await?;
        Ok(())
    }
}

pub struct LocalProductDeletedHandler {
    orders: Arc<dyn OrderService>,
}

#[async_trait]
impl EventHandler for LocalProductDeletedHandler {
    async fn handle(&self, delivery: &Delivery) -> Result<()> {
        let payload: ProductDeletedPayload = delivery.decode()?;
        self.orders.delete_local_product(payload.product_id).await?;
        Ok(())
    }
}

pub fn order_handlers(orders: Arc<dyn OrderService>) -> HandlerRegistry {
    HandlerRegistry::new()
        .register(
            UserCreated::EVENT_TYPE,
            LocalUserCreatedHandler {
                orders: orders.clone(),
            },
        )
        .register(
            UserDeleted::EVENT_TYPE,
            LocalUserDeletedHandler {
                orders: orders.clone(),
            },
        )
        .register(
            ProductCreated::EVENT_TYPE,
            LocalProductCreatedHandler {
                orders: orders.clone(),
            },
        )
        .register(
            ProductUpdated::EVENT_TYPE,
            LocalProductUpdatedHandler {
                orders: orders.clone(),
            },
        )
        .register(
            ProductDeleted::EVENT_TYPE,
            LocalProductDeletedHandler { orders },
        )
}
