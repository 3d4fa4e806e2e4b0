//! Maintenance of the order service's user and product replicas.
//!
//! Replica writes are driven by inbound events, which may be redelivered,
//! so every operation is idempotent and dispatches nothing.

use common::{ProductId, UserId};

use super::{LocalProduct, LocalProductRepository, LocalUser, LocalUserRepository};
use crate::Result;

pub struct ReplicaService<U, P> {
    users: U,
    products: P,
}

impl<U: LocalUserRepository, P: LocalProductRepository> ReplicaService<U, P> {
    pub fn new(users: U, products: P) -> Self {
        Self { users, products }
    }

    #[tracing::instrument(skip(self))]
    pub async fn store_local_user(&self, user_id: UserId) -> Result<()> {
        self.users.store(&LocalUser { user_id }).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_local_user(&self, user_id: UserId) -> Result<()> {
        self.users.delete(user_id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn store_local_product(
        &self,
        product_id: ProductId,
        name: String,
        price: i64,
    ) -> Result<()> {
        self.products
            .store(&LocalProduct {
                product_id,
                name,
                price,
            })
            .await
    }

    /// Applies a partial change. Changes to an unknown product are ignored.
    #[tracing::instrument(skip(self))]
    pub async fn update_local_product(
        &self,
        product_id: ProductId,
        name: Option<String>,
        price: Option<i64>,
    ) -> Result<()> {
        let mut product = match self.products.find(product_id).await {
            Ok(product) => product,
            Err(err) if err.is_not_found() => {
                tracing::debug!(%product_id, "update for unknown product ignored");
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        if let Some(name) = name {
            product.name = name;
        }
        if let Some(price) = price {
            product.price = price;
        }
        self.products.store(&product).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_local_product(&self, product_id: ProductId) -> Result<()> {
        self.products.delete(product_id).await
    }
}
