use std::sync::Arc;

use async_trait::async_trait;
use common::UserId;
use domain::user::{User, UserDomainService, UserRepository, UserSpec};
use domain::{DomainError, Result};
use store::{LockableUnitOfWork, SerializerRegistry};

use crate::dispatcher::OutboxEventDispatcher;
use crate::integration::source;
use crate::locks;
use crate::model::UserInput;
use crate::provider::UserProvider;

/// User use cases.
#[async_trait]
pub trait UserService: Send + Sync {
    /// Creates the user when `input.id` is empty, otherwise brings the
    /// existing user to the given state. Returns the user id.
    async fn store_user(&self, input: UserInput) -> Result<UserId>;

    async fn find_user(&self, id: UserId) -> Result<User>;

    /// Deletes a user. Deleting an absent user succeeds.
    async fn delete_user(&self, id: UserId, hard: bool) -> Result<()>;
}

pub struct UserAppService<L> {
    uow: L,
    registry: Arc<SerializerRegistry>,
}

impl<L> UserAppService<L>
where
    L: LockableUnitOfWork,
    L::Provider: UserProvider,
{
    pub fn new(uow: L, registry: Arc<SerializerRegistry>) -> Self {
        Self { uow, registry }
    }
}

fn domain_service<P: UserProvider>(
    provider: &P,
    registry: Arc<SerializerRegistry>,
) -> UserDomainService<P::Users, OutboxEventDispatcher<P::Outbox>> {
    UserDomainService::new(
        provider.users(),
        OutboxEventDispatcher::new(provider.outbox(), registry, source::USER),
    )
}

#[async_trait]
impl<L> UserService for UserAppService<L>
where
    L: LockableUnitOfWork,
    L::Provider: UserProvider,
{
    #[tracing::instrument(skip(self, input), fields(login = %input.login))]
    async fn store_user(&self, input: UserInput) -> Result<UserId> {
        let mut lock_names = vec![locks::user_login(&input.login)];
        if let Some(email) = &input.email {
            lock_names.push(locks::user_email(email));
        }
        if let Some(id) = input.id {
            lock_names.push(locks::user(id));
        }

        let registry = self.registry.clone();
        self.uow
            .execute(lock_names, move |provider: L::Provider| async move {
                let service = domain_service(&provider, registry);
                let id = match input.id {
                    Some(id) => {
                        service.update_user(id, input.data()).await?;
                        id
                    }
                    None => {
                        let id = service.create_user(&input.login, input.status).await?;
                        if input.has_contacts() {
                            service.update_user(id, input.data()).await?;
                        }
                        id
                    }
                };
                Ok::<_, DomainError>(id)
            })
            .await
    }

    async fn find_user(&self, id: UserId) -> Result<User> {
        self.uow
            .execute(Vec::new(), move |provider: L::Provider| async move {
                provider.users().find(&UserSpec::by_id(id)).await
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn delete_user(&self, id: UserId, hard: bool) -> Result<()> {
        let registry = self.registry.clone();
        self.uow
            .execute(vec![locks::user(id)], move |provider: L::Provider| async move {
                domain_service(&provider, registry)
                    .delete_user(id, hard)
                    .await
            })
            .await
    }
}
