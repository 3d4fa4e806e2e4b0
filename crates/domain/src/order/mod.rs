//! Order aggregate and the order service's user/product replicas.

mod events;
mod memory;
mod replica;
mod service;
mod state;
mod value_objects;

pub use events::{OrderCreated, OrderUpdated};
pub use memory::{MemoryLocalProductRepository, MemoryLocalUserRepository, MemoryOrderRepository};
pub use replica::ReplicaService;
pub use service::OrderDomainService;
pub use state::OrderStatus;
pub use value_objects::{LocalProduct, LocalUser, NewOrderItem, OrderItem, Replica};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use thiserror::Error;

use crate::Result;

/// Errors that can occur when placing or changing an order.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The order has no items.
    #[error("Order has no items")]
    NoItems,

    /// An item quantity is not positive.
    #[error("Invalid quantity {quantity} for product {product_id} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId, quantity: i32 },

    /// The same product appears on more than one line.
    #[error("Product {0} appears more than once")]
    DuplicateProduct(ProductId),

    /// The ordering user is unknown to the order service.
    #[error("Unknown user: {0}")]
    UnknownUser(UserId),

    /// A product is unknown to the order service.
    #[error("Unknown product: {0}")]
    UnknownProduct(ProductId),

    /// The total price does not fit in 64 bits.
    #[error("Order total overflows")]
    TotalOverflow,

    /// The status change is not allowed.
    #[error("Invalid status transition: cannot move from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },
}

/// An order. Items and total are fixed at creation; only status changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    /// Σ quantity × unit price, in minor currency units.
    pub total_price: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sparse filter over orders. An empty specification matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderSpec {
    pub id: Option<OrderId>,
    pub user_id: Option<UserId>,
}

impl OrderSpec {
    /// Matches the order with `id`.
    pub fn by_id(id: OrderId) -> Self {
        Self {
            id: Some(id),
            user_id: None,
        }
    }

    /// Returns true if no field is populated.
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.user_id.is_none()
    }

    /// Returns true if `order` satisfies every populated field.
    pub fn matches(&self, order: &Order) -> bool {
        !self.is_empty()
            && self.id.is_none_or(|id| id == order.id)
            && self.user_id.is_none_or(|id| id == order.user_id)
    }
}

/// Storage of orders.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Allocates a new order id.
    async fn next_id(&self) -> Result<OrderId>;

    /// Inserts or replaces an order with its items.
    async fn store(&self, order: &Order) -> Result<()>;

    /// Returns the first order matching `spec`, or `NotFound`.
    async fn find(&self, spec: &OrderSpec) -> Result<Order>;
}

/// Storage of the user replica.
#[async_trait]
pub trait LocalUserRepository: Send + Sync {
    /// Inserts a replica row. Storing an existing or deleted user is a no-op.
    async fn store(&self, user: &LocalUser) -> Result<()>;

    /// Returns the replica of `user_id`, or `NotFound`.
    async fn find(&self, user_id: UserId) -> Result<LocalUser>;

    /// Replaces the replica row with a tombstone. Deleting an absent user
    /// still leaves one.
    async fn delete(&self, user_id: UserId) -> Result<()>;
}

/// Storage of the product replica.
#[async_trait]
pub trait LocalProductRepository: Send + Sync {
    /// Inserts or replaces a replica row. A deleted product stays deleted.
    async fn store(&self, product: &LocalProduct) -> Result<()>;

    /// Returns the replica of `product_id`, or `NotFound`.
    async fn find(&self, product_id: ProductId) -> Result<LocalProduct>;

    /// Returns the replicas of the given products. Unknown ids are omitted.
    async fn find_many(&self, product_ids: &[ProductId]) -> Result<Vec<LocalProduct>>;

    /// Replaces the replica row with a tombstone. Deleting an absent product
    /// still leaves one.
    async fn delete(&self, product_id: ProductId) -> Result<()>;
}
