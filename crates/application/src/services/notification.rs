use async_trait::async_trait;
use common::{NotificationId, OrderId, UserId};
use domain::Result;
use domain::notification::{Notification, NotificationDomainService};
use store::LockableUnitOfWork;

use crate::locks;
use crate::provider::NotificationProvider;

/// Notification use cases.
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Records a notification, returning the existing id for a duplicate.
    async fn create_notification(
        &self,
        order_id: OrderId,
        user_id: UserId,
        message: String,
    ) -> Result<NotificationId>;

    /// Returns the notifications of `user_id`, newest first.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Notification>>;
}

pub struct NotificationAppService<L> {
    uow: L,
}

impl<L> NotificationAppService<L>
where
    L: LockableUnitOfWork,
    L::Provider: NotificationProvider,
{
    pub fn new(uow: L) -> Self {
        Self { uow }
    }
}

#[async_trait]
impl<L> NotificationService for NotificationAppService<L>
where
    L: LockableUnitOfWork,
    L::Provider: NotificationProvider,
{
    #[tracing::instrument(skip(self, message))]
    async fn create_notification(
        &self,
        order_id: OrderId,
        user_id: UserId,
        message: String,
    ) -> Result<NotificationId> {
        self.uow
            .execute(
                vec![locks::notification_order(order_id)],
                move |provider: L::Provider| async move {
                    NotificationDomainService::new(provider.notifications())
                        .create_notification(order_id, user_id, &message)
                        .await
                },
            )
            .await
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Notification>> {
        self.uow
            .execute(Vec::new(), move |provider: L::Provider| async move {
                NotificationDomainService::new(provider.notifications())
                    .list_for_user(user_id)
                    .await
            })
            .await
    }
}
