use std::sync::Arc;

use async_trait::async_trait;
use common::ProductId;
use domain::Result;
use domain::product::{Product, ProductData, ProductDomainService};
use store::{LockableUnitOfWork, SerializerRegistry};

use crate::dispatcher::OutboxEventDispatcher;
use crate::integration::source;
use crate::locks;
use crate::provider::ProductProvider;

/// Catalogue use cases.
#[async_trait]
pub trait ProductService: Send + Sync {
    async fn create_product(&self, data: ProductData) -> Result<ProductId>;

    async fn update_product(&self, id: ProductId, data: ProductData) -> Result<()>;

    /// Removes a product. Removing an absent product succeeds.
    async fn delete_product(&self, id: ProductId) -> Result<()>;

    async fn find_product(&self, id: ProductId) -> Result<Product>;
}

pub struct ProductAppService<L> {
    uow: L,
    registry: Arc<SerializerRegistry>,
}

impl<L> ProductAppService<L>
where
    L: LockableUnitOfWork,
    L::Provider: ProductProvider,
{
    pub fn new(uow: L, registry: Arc<SerializerRegistry>) -> Self {
        Self { uow, registry }
    }
}

fn domain_service<P: ProductProvider>(
    provider: &P,
    registry: Arc<SerializerRegistry>,
) -> ProductDomainService<P::Products, OutboxEventDispatcher<P::Outbox>> {
    ProductDomainService::new(
        provider.products(),
        OutboxEventDispatcher::new(provider.outbox(), registry, source::PRODUCT),
    )
}

#[async_trait]
impl<L> ProductService for ProductAppService<L>
where
    L: LockableUnitOfWork,
    L::Provider: ProductProvider,
{
    #[tracing::instrument(skip(self, data), fields(name = %data.name))]
    async fn create_product(&self, data: ProductData) -> Result<ProductId> {
        let registry = self.registry.clone();
        self.uow
            .execute(
                vec![locks::product_name(&data.name)],
                move |provider: L::Provider| async move {
                    domain_service(&provider, registry)
                        .create_product(data)
                        .await
                },
            )
            .await
    }

    #[tracing::instrument(skip(self, data))]
    async fn update_product(&self, id: ProductId, data: ProductData) -> Result<()> {
        let registry = self.registry.clone();
        self.uow
            .execute(
                vec![locks::product(id), locks::product_name(&data.name)],
                move |provider: L::Provider| async move {
                    domain_service(&provider, registry)
                        .update_product(id, data)
                        .await
                },
            )
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let registry = self.registry.clone();
        self.uow
            .execute(vec![locks::product(id)], move |provider: L::Provider| async move {
                domain_service(&provider, registry).delete_product(id).await
            })
            .await
    }

    async fn find_product(&self, id: ProductId) -> Result<Product> {
        let registry = self.registry.clone();
        self.uow
            .execute(Vec::new(), move |provider: L::Provider| async move {
                domain_service(&provider, registry).find_product(id).await
            })
            .await
    }
}
