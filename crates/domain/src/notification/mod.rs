//! Notification aggregate. Append-only; notifications are never changed.

mod service;

pub use service::NotificationDomainService;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{NotificationId, OrderId, UserId};
use store::StagedTable;

use crate::{DomainError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub order_id: OrderId,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Sparse filter over notifications. An empty specification matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationSpec {
    pub id: Option<NotificationId>,
    pub user_id: Option<UserId>,
    pub order_id: Option<OrderId>,
    pub message: Option<String>,
}

impl NotificationSpec {
    pub fn by_id(id: NotificationId) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    /// Matches the notification about `order_id` sent to `user_id` with `message`.
    pub fn by_content(order_id: OrderId, user_id: UserId, message: &str) -> Self {
        Self {
            id: None,
            user_id: Some(user_id),
            order_id: Some(order_id),
            message: Some(message.to_string()),
        }
    }

    /// Returns true if no field is populated.
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.user_id.is_none()
            && self.order_id.is_none()
            && self.message.is_none()
    }

    /// Returns true if `notification` satisfies every populated field.
    pub fn matches(&self, notification: &Notification) -> bool {
        !self.is_empty()
            && self.id.is_none_or(|id| id == notification.id)
            && self.user_id.is_none_or(|id| id == notification.user_id)
            && self.order_id.is_none_or(|id| id == notification.order_id)
            && self
                .message
                .as_ref()
                .is_none_or(|message| *message == notification.message)
    }
}

/// Storage of notifications.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Allocates a new notification id.
    async fn next_id(&self) -> Result<NotificationId>;

    /// Inserts a notification.
    async fn store(&self, notification: &Notification) -> Result<()>;

    /// Returns the first notification matching `spec`, or `NotFound`.
    async fn find(&self, spec: &NotificationSpec) -> Result<Notification>;

    /// Returns the notifications of `user_id`, newest first.
    async fn find_for_user(&self, user_id: UserId) -> Result<Vec<Notification>>;
}

/// [`NotificationRepository`] over a staged in-memory table.
#[derive(Clone)]
pub struct MemoryNotificationRepository {
    notifications: StagedTable<NotificationId, Notification>,
}

impl MemoryNotificationRepository {
    pub fn new(notifications: StagedTable<NotificationId, Notification>) -> Self {
        Self { notifications }
    }
}

#[async_trait]
impl NotificationRepository for MemoryNotificationRepository {
    async fn next_id(&self) -> Result<NotificationId> {
        Ok(NotificationId::new())
    }

    async fn store(&self, notification: &Notification) -> Result<()> {
        self.notifications
            .put(notification.id, notification.clone())
            .await;
        Ok(())
    }

    async fn find(&self, spec: &NotificationSpec) -> Result<Notification> {
        self.notifications
            .find(|notification| spec.matches(notification))
            .await
            .ok_or_else(|| DomainError::not_found("notification"))
    }

    async fn find_for_user(&self, user_id: UserId) -> Result<Vec<Notification>> {
        let mut notifications = self
            .notifications
            .filter(|notification| notification.user_id == user_id)
            .await;
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(message: &str) -> Notification {
        Notification {
            id: NotificationId::new(),
            user_id: UserId::new(),
            order_id: OrderId::new(),
            message: message.to_string(),
            created_at: common::time::now(),
        }
    }

    #[test]
    fn empty_spec_matches_nothing() {
        assert!(!NotificationSpec::default().matches(&notification("hi")));
    }

    #[test]
    fn content_spec_requires_every_field() {
        let n = notification("Order created");
        assert!(NotificationSpec::by_content(n.order_id, n.user_id, "Order created").matches(&n));
        assert!(!NotificationSpec::by_content(n.order_id, n.user_id, "Order paid").matches(&n));
        assert!(
            !NotificationSpec::by_content(OrderId::new(), n.user_id, "Order created").matches(&n)
        );
    }
}
