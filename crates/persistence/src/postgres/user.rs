use async_trait::async_trait;
use common::UserId;
use domain::user::{User, UserRepository, UserSpec, UserStatus};
use domain::{DomainError, Result};
use sqlx::postgres::PgRow;
use sqlx::{Postgres, QueryBuilder, Row};
use store::PgTransaction;
use uuid::Uuid;

use super::{db_error, decode_error, timed, unique_violation};

#[derive(Clone)]
pub struct PgUserRepository {
    tx: PgTransaction,
}

impl PgUserRepository {
    pub fn new(tx: PgTransaction) -> Self {
        Self { tx }
    }

    fn row_to_user(row: PgRow) -> Result<User> {
        let code: i16 = row.try_get("status").map_err(db_error)?;
        let status = UserStatus::from_code(code)
            .ok_or_else(|| decode_error(format!("invalid user status {code}")))?;

        Ok(User {
            id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id").map_err(db_error)?),
            login: row.try_get("login").map_err(db_error)?,
            email: row.try_get("email").map_err(db_error)?,
            telegram: row.try_get("telegram").map_err(db_error)?,
            status,
            created_at: row.try_get("created_at").map_err(db_error)?,
            updated_at: row.try_get("updated_at").map_err(db_error)?,
            deleted_at: row.try_get("deleted_at").map_err(db_error)?,
        })
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn next_id(&self) -> Result<UserId> {
        Ok(UserId::new())
    }

    async fn store(&self, user: &User) -> Result<()> {
        let mut conn = self.tx.connection().await?;
        let query = sqlx::query(
            r#"
            INSERT INTO users (user_id, login, email, telegram, status, created_at, updated_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id) DO UPDATE SET
                login = EXCLUDED.login,
                email = EXCLUDED.email,
                telegram = EXCLUDED.telegram,
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at,
                deleted_at = EXCLUDED.deleted_at
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.login)
        .bind(&user.email)
        .bind(&user.telegram)
        .bind(user.status.code())
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.deleted_at);

        timed("upsert", "users", query.execute(&mut *conn))
            .await
            .map_err(|e| match unique_violation(&e) {
                Some("idx_users_login") => DomainError::already_used("user", "login"),
                Some("idx_users_email") => DomainError::already_used("user", "email"),
                _ => db_error(e),
            })?;
        Ok(())
    }

    async fn find(&self, spec: &UserSpec) -> Result<User> {
        if spec.is_empty() {
            return Err(DomainError::not_found("user"));
        }

        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT user_id, login, email, telegram, status, created_at, updated_at, deleted_at \
             FROM users WHERE TRUE",
        );
        if let Some(id) = spec.id {
            query.push(" AND user_id = ").push_bind(id.as_uuid());
        }
        if let Some(login) = &spec.login {
            query.push(" AND login = ").push_bind(login.clone());
        }
        if let Some(email) = &spec.email {
            query.push(" AND email = ").push_bind(email.clone());
        }
        query.push(" LIMIT 1");

        let mut conn = self.tx.connection().await?;
        let row = timed("select", "users", query.build().fetch_optional(&mut *conn))
            .await
            .map_err(db_error)?;

        match row {
            Some(row) => Self::row_to_user(row),
            None => Err(DomainError::not_found("user")),
        }
    }

    async fn hard_delete(&self, id: UserId) -> Result<()> {
        let mut conn = self.tx.connection().await?;
        let query = sqlx::query("DELETE FROM users WHERE user_id = $1").bind(id.as_uuid());
        timed("delete", "users", query.execute(&mut *conn))
            .await
            .map_err(db_error)?;
        Ok(())
    }
}
