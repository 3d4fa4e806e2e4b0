use async_trait::async_trait;
use common::{NotificationId, OrderId, UserId};
use domain::notification::{Notification, NotificationRepository, NotificationSpec};
use domain::{DomainError, Result};
use sqlx::postgres::PgRow;
use sqlx::{Postgres, QueryBuilder, Row};
use store::PgTransaction;
use uuid::Uuid;

use super::{db_error, timed};

const COLUMNS: &str = "notification_id, user_id, order_id, message, created_at";

#[derive(Clone)]
pub struct PgNotificationRepository {
    tx: PgTransaction,
}

impl PgNotificationRepository {
    pub fn new(tx: PgTransaction) -> Self {
        Self { tx }
    }

    fn row_to_notification(row: PgRow) -> std::result::Result<Notification, sqlx::Error> {
        Ok(Notification {
            id: NotificationId::from_uuid(row.try_get::<Uuid, _>("notification_id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            message: row.try_get("message")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn next_id(&self) -> Result<NotificationId> {
        Ok(NotificationId::new())
    }

    async fn store(&self, notification: &Notification) -> Result<()> {
        let mut conn = self.tx.connection().await?;
        let query = sqlx::query(
            r#"
            INSERT INTO notifications (notification_id, user_id, order_id, message, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(notification.id.as_uuid())
        .bind(notification.user_id.as_uuid())
        .bind(notification.order_id.as_uuid())
        .bind(&notification.message)
        .bind(notification.created_at);

        timed("insert", "notifications", query.execute(&mut *conn))
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn find(&self, spec: &NotificationSpec) -> Result<Notification> {
        if spec.is_empty() {
            return Err(DomainError::not_found("notification"));
        }

        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM notifications WHERE TRUE"));
        if let Some(id) = spec.id {
            query.push(" AND notification_id = ").push_bind(id.as_uuid());
        }
        if let Some(user_id) = spec.user_id {
            query.push(" AND user_id = ").push_bind(user_id.as_uuid());
        }
        if let Some(order_id) = spec.order_id {
            query.push(" AND order_id = ").push_bind(order_id.as_uuid());
        }
        if let Some(message) = &spec.message {
            query.push(" AND message = ").push_bind(message.clone());
        }
        query.push(" LIMIT 1");

        let mut conn = self.tx.connection().await?;
        let row = timed(
            "select",
            "notifications",
            query.build().fetch_optional(&mut *conn),
        )
        .await
        .map_err(db_error)?;

        row.map(Self::row_to_notification)
            .transpose()
            .map_err(db_error)?
            .ok_or_else(|| DomainError::not_found("notification"))
    }

    async fn find_for_user(&self, user_id: UserId) -> Result<Vec<Notification>> {
        let mut conn = self.tx.connection().await?;
        let sql = format!(
            "SELECT {COLUMNS} FROM notifications WHERE user_id = $1 \
             ORDER BY created_at DESC, notification_id DESC"
        );
        let query = sqlx::query(&sql).bind(user_id.as_uuid());
        let rows = timed("select", "notifications", query.fetch_all(&mut *conn))
            .await
            .map_err(db_error)?;

        rows.into_iter()
            .map(Self::row_to_notification)
            .collect::<std::result::Result<_, _>>()
            .map_err(db_error)
    }
}
