use std::sync::Arc;

use async_trait::async_trait;
use common::UserId;
use domain::Result;
use domain::account::{Account, AccountDomainService};
use store::{LockableUnitOfWork, SerializerRegistry};

use crate::dispatcher::OutboxEventDispatcher;
use crate::integration::source;
use crate::locks;
use crate::provider::AccountProvider;

/// Balance use cases.
#[async_trait]
pub trait AccountService: Send + Sync {
    /// Creates or overwrites the balance of `user_id`.
    async fn store_balance(&self, user_id: UserId, balance: i64) -> Result<()>;

    async fn find_balance(&self, user_id: UserId) -> Result<Account>;
}

pub struct AccountAppService<L> {
    uow: L,
    registry: Arc<SerializerRegistry>,
}

impl<L> AccountAppService<L>
where
    L: LockableUnitOfWork,
    L::Provider: AccountProvider,
{
    pub fn new(uow: L, registry: Arc<SerializerRegistry>) -> Self {
        Self { uow, registry }
    }
}

fn domain_service<P: AccountProvider>(
    provider: &P,
    registry: Arc<SerializerRegistry>,
) -> AccountDomainService<P::Accounts, OutboxEventDispatcher<P::Outbox>> {
    AccountDomainService::new(
        provider.accounts(),
        OutboxEventDispatcher::new(provider.outbox(), registry, source::PAYMENT),
    )
}

#[async_trait]
impl<L> AccountService for AccountAppService<L>
where
    L: LockableUnitOfWork,
    L::Provider: AccountProvider,
{
    #[tracing::instrument(skip(self))]
    async fn store_balance(&self, user_id: UserId, balance: i64) -> Result<()> {
        let registry = self.registry.clone();
        self.uow
            .execute(
                vec![locks::user_balance(user_id)],
                move |provider: L::Provider| async move {
                    domain_service(&provider, registry)
                        .store_balance(user_id, balance)
                        .await
                },
            )
            .await
    }

    async fn find_balance(&self, user_id: UserId) -> Result<Account> {
        let registry = self.registry.clone();
        self.uow
            .execute(Vec::new(), move |provider: L::Provider| async move {
                domain_service(&provider, registry)
                    .find_account(user_id)
                    .await
            })
            .await
    }
}
