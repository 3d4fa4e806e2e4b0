use common::{NotificationId, OrderId, UserId};

use super::{Notification, NotificationRepository, NotificationSpec};
use crate::Result;

/// Domain service for notifications. Raises no events.
pub struct NotificationDomainService<R> {
    repository: R,
}

impl<R: NotificationRepository> NotificationDomainService<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Records a notification.
    ///
    /// An identical notification already on record is returned instead, so a
    /// redelivered event does not notify twice.
    #[tracing::instrument(skip(self))]
    pub async fn create_notification(
        &self,
        order_id: OrderId,
        user_id: UserId,
        message: &str,
    ) -> Result<NotificationId> {
        match self
            .repository
            .find(&NotificationSpec::by_content(order_id, user_id, message))
            .await
        {
            Ok(existing) => {
                tracing::debug!(id = %existing.id, "notification already recorded");
                return Ok(existing.id);
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        let id = self.repository.next_id().await?;
        self.repository
            .store(&Notification {
                id,
                user_id,
                order_id,
                message: message.to_string(),
                created_at: common::time::now(),
            })
            .await?;

        tracing::info!(%id, "notification created");
        Ok(id)
    }

    /// Returns the notifications of `user_id`, newest first.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Notification>> {
        self.repository.find_for_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::MemoryNotificationRepository;
    use store::{MemoryTable, MemoryTransaction};

    fn service() -> NotificationDomainService<MemoryNotificationRepository> {
        let tx = MemoryTransaction::new();
        NotificationDomainService::new(MemoryNotificationRepository::new(
            MemoryTable::new().stage(&tx),
        ))
    }

    #[tokio::test]
    async fn identical_notification_is_created_once() {
        let service = service();
        let (order_id, user_id) = (OrderId::new(), UserId::new());

        let first = service
            .create_notification(order_id, user_id, "Order created")
            .await
            .unwrap();
        let second = service
            .create_notification(order_id, user_id, "Order created")
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(service.list_for_user(user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_is_newest_first_and_per_user() {
        let service = service();
        let user_id = UserId::new();

        let older = service
            .create_notification(OrderId::new(), user_id, "first")
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let newer = service
            .create_notification(OrderId::new(), user_id, "second")
            .await
            .unwrap();
        service
            .create_notification(OrderId::new(), UserId::new(), "someone else")
            .await
            .unwrap();

        let ids: Vec<_> = service
            .list_for_user(user_id)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec![newer, older]);
    }

    #[tokio::test]
    async fn unknown_user_has_no_notifications() {
        assert!(service().list_for_user(UserId::new()).await.unwrap().is_empty());
    }
}
