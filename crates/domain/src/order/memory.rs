use async_trait::async_trait;
use common::{OrderId, ProductId, UserId};
use store::StagedTable;

use super::{
    LocalProduct, LocalProductRepository, LocalUser, LocalUserRepository, Order, OrderRepository,
    OrderSpec, Replica,
};
use crate::{DomainError, Result};

/// [`OrderRepository`] over a staged in-memory table.
#[derive(Clone)]
pub struct MemoryOrderRepository {
    orders: StagedTable<OrderId, Order>,
}

impl MemoryOrderRepository {
    pub fn new(orders: StagedTable<OrderId, Order>) -> Self {
        Self { orders }
    }
}

#[async_trait]
impl OrderRepository for MemoryOrderRepository {
    async fn next_id(&self) -> Result<OrderId> {
        Ok(OrderId::new())
    }

    async fn store(&self, order: &Order) -> Result<()> {
        self.orders.put(order.id, order.clone()).await;
        Ok(())
    }

    async fn find(&self, spec: &OrderSpec) -> Result<Order> {
        self.orders
            .find(|order| spec.matches(order))
            .await
            .ok_or_else(|| DomainError::not_found("order"))
    }
}

/// [`LocalUserRepository`] over a staged in-memory table.
#[derive(Clone)]
pub struct MemoryLocalUserRepository {
    users: StagedTable<UserId, Replica<LocalUser>>,
}

impl MemoryLocalUserRepository {
    pub fn new(users: StagedTable<UserId, Replica<LocalUser>>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl LocalUserRepository for MemoryLocalUserRepository {
    async fn store(&self, user: &LocalUser) -> Result<()> {
        if self.users.get(&user.user_id).await.is_none() {
            self.users.put(user.user_id, Replica::Live(*user)).await;
        }
        Ok(())
    }

    async fn find(&self, user_id: UserId) -> Result<LocalUser> {
        self.users
            .get(&user_id)
            .await
            .and_then(Replica::live)
            .ok_or_else(|| DomainError::not_found("user"))
    }

    async fn delete(&self, user_id: UserId) -> Result<()> {
        self.users.put(user_id, Replica::Deleted).await;
        Ok(())
    }
}

/// [`LocalProductRepository`] over a staged in-memory table.
#[derive(Clone)]
pub struct MemoryLocalProductRepository {
    products: StagedTable<ProductId, Replica<LocalProduct>>,
}

impl MemoryLocalProductRepository {
    pub fn new(products: StagedTable<ProductId, Replica<LocalProduct>>) -> Self {
        Self { products }
    }
}

#[async_trait]
impl LocalProductRepository for MemoryLocalProductRepository {
    async fn store(&self, product: &LocalProduct) -> Result<()> {
        let deleted = self
            .products
            .get(&product.product_id)
            .await
            .is_some_and(|row| row.is_deleted());
        if !deleted {
            self.products
                .put(product.product_id, Replica::Live(product.clone()))
                .await;
        }
        Ok(())
    }

    async fn find(&self, product_id: ProductId) -> Result<LocalProduct> {
        self.products
            .get(&product_id)
            .await
            .and_then(Replica::live)
            .ok_or_else(|| DomainError::not_found("product"))
    }

    async fn find_many(&self, product_ids: &[ProductId]) -> Result<Vec<LocalProduct>> {
        Ok(self
            .products
            .filter(|row| matches!(row, Replica::Live(p) if product_ids.contains(&p.product_id)))
            .await
            .into_iter()
            .filter_map(Replica::live)
            .collect())
    }

    async fn delete(&self, product_id: ProductId) -> Result<()> {
        self.products.put(product_id, Replica::Deleted).await;
        Ok(())
    }
}
