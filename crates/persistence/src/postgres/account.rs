use async_trait::async_trait;
use common::UserId;
use domain::account::{Account, AccountRepository, AccountSpec};
use domain::{DomainError, Result};
use sqlx::Row;
use sqlx::postgres::PgRow;
use store::PgTransaction;
use uuid::Uuid;

use super::{db_error, timed, unique_violation};

#[derive(Clone)]
pub struct PgAccountRepository {
    tx: PgTransaction,
}

impl PgAccountRepository {
    pub fn new(tx: PgTransaction) -> Self {
        Self { tx }
    }

    fn row_to_account(row: PgRow) -> std::result::Result<Account, sqlx::Error> {
        Ok(Account {
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            balance: row.try_get("balance")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn next_id(&self, user_id: UserId) -> Result<UserId> {
        Ok(user_id)
    }

    async fn store(&self, account: &Account) -> Result<()> {
        let mut conn = self.tx.connection().await?;
        let query = sqlx::query(
            r#"
            INSERT INTO accounts (user_id, balance, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE SET
                balance = EXCLUDED.balance,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(account.user_id.as_uuid())
        .bind(account.balance)
        .bind(account.created_at)
        .bind(account.updated_at);

        timed("upsert", "accounts", query.execute(&mut *conn))
            .await
            .map_err(|e| match unique_violation(&e) {
                Some(_) => DomainError::already_used("account", "user_id"),
                None => db_error(e),
            })?;
        Ok(())
    }

    async fn find(&self, spec: &AccountSpec) -> Result<Account> {
        let Some(user_id) = spec.user_id else {
            return Err(DomainError::not_found("account"));
        };

        let mut conn = self.tx.connection().await?;
        let query = sqlx::query(
            "SELECT user_id, balance, created_at, updated_at FROM accounts WHERE user_id = $1",
        )
        .bind(user_id.as_uuid());
        let row = timed("select", "accounts", query.fetch_optional(&mut *conn))
            .await
            .map_err(db_error)?;

        row.map(Self::row_to_account)
            .transpose()
            .map_err(db_error)?
            .ok_or_else(|| DomainError::not_found("account"))
    }

    async fn delete(&self, user_id: UserId) -> Result<()> {
        let mut conn = self.tx.connection().await?;
        let query = sqlx::query("DELETE FROM accounts WHERE user_id = $1").bind(user_id.as_uuid());
        timed("delete", "accounts", query.execute(&mut *conn))
            .await
            .map_err(db_error)?;
        Ok(())
    }
}
