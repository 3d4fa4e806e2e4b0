use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, ProductId, UserId};
use domain::Result;
use domain::order::{
    NewOrderItem, Order, OrderDomainService, OrderSpec, OrderStatus, ReplicaService,
};
use store::{LockableUnitOfWork, SerializerRegistry};

use crate::dispatcher::OutboxEventDispatcher;
use crate::integration::source;
use crate::locks;
use crate::provider::OrderProvider;

/// Order use cases and maintenance of the order service's replicas.
#[async_trait]
pub trait OrderService: Send + Sync {
    async fn create_order(&self, user_id: UserId, items: Vec<NewOrderItem>) -> Result<OrderId>;

    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<()>;

    async fn find_order(&self, id: OrderId) -> Result<Order>;

    async fn store_local_user(&self, user_id: UserId) -> Result<()>;

    async fn delete_local_user(&self, user_id: UserId) -> Result<()>;

    async fn store_local_product(&self, product_id: ProductId, name: String, price: i64)
    -> Result<()>;

    /// Applies a partial change to a replicated product. Unknown products are ignored.
    async fn update_local_product(
        &self,
        product_id: ProductId,
        name: Option<String>,
        price: Option<i64>,
    ) -> Result<()>;

    async fn delete_local_product(&self, product_id: ProductId) -> Result<()>;
}

pub struct OrderAppService<L> {
    uow: L,
    registry: Arc<SerializerRegistry>,
}

impl<L> OrderAppService<L>
where
    L: LockableUnitOfWork,
    L::Provider: OrderProvider,
{
    pub fn new(uow: L, registry: Arc<SerializerRegistry>) -> Self {
        Self { uow, registry }
    }
}

type DomainService<P> = OrderDomainService<
    <P as OrderProvider>::Orders,
    <P as OrderProvider>::LocalUsers,
    <P as OrderProvider>::LocalProducts,
    OutboxEventDispatcher<<P as OrderProvider>::Outbox>,
>;

fn domain_service<P: OrderProvider>(
    provider: &P,
    registry: Arc<SerializerRegistry>,
) -> DomainService<P> {
    OrderDomainService::new(
        provider.orders(),
        provider.local_users(),
        provider.local_products(),
        OutboxEventDispatcher::new(provider.outbox(), registry, source::ORDER),
    )
}

fn replica<P: OrderProvider>(provider: &P) -> ReplicaService<P::LocalUsers, P::LocalProducts> {
    ReplicaService::new(provider.local_users(), provider.local_products())
}

#[async_trait]
impl<L> OrderService for OrderAppService<L>
where
    L: LockableUnitOfWork,
    L::Provider: OrderProvider,
{
    #[tracing::instrument(skip(self, items))]
    async fn create_order(&self, user_id: UserId, items: Vec<NewOrderItem>) -> Result<OrderId> {
        let registry = self.registry.clone();
        self.uow
            .execute(Vec::new(), move |provider: L::Provider| async move {
                domain_service(&provider, registry)
                    .create_order(user_id, &items)
                    .await
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<()> {
        let registry = self.registry.clone();
        self.uow
            .execute(vec![locks::order(id)], move |provider: L::Provider| async move {
                domain_service(&provider, registry)
                    .update_order_status(id, status)
                    .await
            })
            .await
    }

    async fn find_order(&self, id: OrderId) -> Result<Order> {
        let registry = self.registry.clone();
        self.uow
            .execute(Vec::new(), move |provider: L::Provider| async move {
                domain_service(&provider, registry)
                    .find_order(&OrderSpec::by_id(id))
                    .await
            })
            .await
    }

    async fn store_local_user(&self, user_id: UserId) -> Result<()> {
        self.uow
            .execute(Vec::new(), move |provider: L::Provider| async move {
                replica(&provider).store_local_user(user_id).await
            })
            .await
    }

    async fn delete_local_user(&self, user_id: UserId) -> Result<()> {
        self.uow
            .execute(Vec::new(), move |provider: L::Provider| async move {
                replica(&provider).delete_local_user(user_id).await
            })
            .await
    }

    async fn store_local_product(
        &self,
        product_id: ProductId,
        name: String,
        price: i64,
    ) -> Result<()> {
        self.uow
            .execute(
                vec![locks::product(product_id)],
                move |provider: L::Provider| async move {
                    replica(&provider)
                        .store_local_product(product_id, name, price)
                        .await
                },
            )
            .await
    }

    async fn update_local_product(
        &self,
        product_id: ProductId,
        name: Option<String>,
        price: Option<i64>,
    ) -> Result<()> {
        self.uow
            .execute(
                vec![locks::product(product_id)],
                move |provider: L::Provider| async move {
                    replica(&provider)
                        .update_local_product(product_id, name, price)
                        .await
                },
            )
            .await
    }

    async fn delete_local_product(&self, product_id: ProductId) -> Result<()> {
        self.uow
            .execute(
                vec![locks::product(product_id)],
                move |provider: L::Provider| async move {
                    replica(&provider).delete_local_product(product_id).await
                },
            )
            .await
    }
}
