//! PostgreSQL implementations.
//!
//! A [`PgTransaction`] is shared by every repository of one unit of work, so
//! aggregate writes and outbox records land in the same database
//! transaction. Named locks are session-level advisory locks held on a
//! pooled connection of their own, which makes them a mutex across every
//! service instance using the same database.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use uuid::Uuid;

use crate::lock::{LockGuard, Locker};
use crate::outbox::{OutboxReader, OutboxRecord, OutboxWriter};
use crate::uow::{UnitOfWork, finish, run_guarded};
use crate::{Result, StoreError};

/// A database transaction shared between the repositories of one unit of work.
#[derive(Clone)]
pub struct PgTransaction {
    inner: Arc<Mutex<Option<Transaction<'static, Postgres>>>>,
}

impl PgTransaction {
    /// Begins a transaction on `pool`.
    pub async fn begin(pool: &PgPool) -> Result<Self> {
        let tx = pool.begin().await?;
        Ok(Self {
            inner: Arc::new(Mutex::new(Some(tx))),
        })
    }

    /// Borrows the transaction's connection for one statement.
    pub async fn connection(&self) -> Result<MappedMutexGuard<'_, PgConnection>> {
        MutexGuard::try_map(self.inner.lock().await, |tx| tx.as_deref_mut())
            .map_err(|_| StoreError::TransactionClosed)
    }

    /// Commits the transaction.
    pub async fn commit(&self) -> Result<()> {
        let tx = self
            .inner
            .lock()
            .await
            .take()
            .ok_or(StoreError::TransactionClosed)?;
        tx.commit().await?;
        Ok(())
    }

    /// Rolls the transaction back. Rolling back a finished transaction is a no-op.
    pub async fn rollback(&self) -> Result<()> {
        let tx = self.inner.lock().await.take();
        if let Some(tx) = tx {
            tx.rollback().await?;
        }
        Ok(())
    }
}

/// PostgreSQL [`UnitOfWork`].
pub struct PgUnitOfWork<P> {
    pool: PgPool,
    factory: Arc<dyn Fn(PgTransaction) -> P + Send + Sync>,
}

impl<P> Clone for PgUnitOfWork<P> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            factory: self.factory.clone(),
        }
    }
}

impl<P> PgUnitOfWork<P> {
    /// Creates a unit of work whose providers are built by `factory`.
    pub fn new<F>(pool: PgPool, factory: F) -> Self
    where
        F: Fn(PgTransaction) -> P + Send + Sync + 'static,
    {
        Self {
            pool,
            factory: Arc::new(factory),
        }
    }

    /// Returns the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl<P: Send + 'static> UnitOfWork for PgUnitOfWork<P> {
    type Provider = P;

    async fn execute<T, E, F, Fut>(&self, work: F) -> std::result::Result<T, E>
    where
        T: Send,
        E: From<StoreError> + Send,
        F: FnOnce(Self::Provider) -> Fut + Send,
        Fut: Future<Output = std::result::Result<T, E>> + Send,
    {
        let tx = PgTransaction::begin(&self.pool).await?;
        let provider = (self.factory)(tx.clone());
        let result = run_guarded(async move { work(provider).await }).await;
        finish(result, tx.commit(), tx.rollback()).await
    }
}

/// Bounds of the pause between attempts on a contended lock.
const POLL_MIN: Duration = Duration::from_millis(5);
const POLL_MAX: Duration = Duration::from_millis(100);

/// Advisory-lock based [`Locker`].
///
/// Waiting never occupies a connection: each attempt borrows one for a
/// `pg_try_advisory_lock` and hands it back if the lock is taken. Only a
/// held lock keeps its session, so the pool passed here should not be the
/// one transactions draw from.
#[derive(Clone)]
pub struct PgLocker {
    pool: PgPool,
}

impl PgLocker {
    /// Creates a locker drawing lock sessions from `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

struct PgLockGuard {
    name: String,
    conn: PoolConnection<Postgres>,
    // The session may hold the lock; it must not return to the pool.
    armed: bool,
}

#[async_trait]
impl LockGuard for PgLockGuard {
    fn name(&self) -> &str {
        &self.name
    }

    async fn release(&mut self) -> Result<()> {
        if self.armed {
            sqlx::query("SELECT pg_advisory_unlock(hashtextextended($1, 0))")
                .bind(&self.name)
                .execute(&mut *self.conn)
                .await
                .map_err(|e| StoreError::Lock {
                    name: self.name.clone(),
                    reason: e.to_string(),
                })?;
            self.armed = false;
        }
        Ok(())
    }
}

impl Drop for PgLockGuard {
    fn drop(&mut self) {
        // The session ends with the connection and the server frees the lock.
        if self.armed {
            self.conn.close_on_drop();
        }
    }
}

#[async_trait]
impl Locker for PgLocker {
    async fn lock(&self, name: &str) -> Result<Box<dyn LockGuard>> {
        let mut pause = POLL_MIN;
        loop {
            // Armed before the query: a cancelled or failed attempt may still
            // have been granted server-side.
            let mut guard = PgLockGuard {
                name: name.to_string(),
                conn: self.pool.acquire().await?,
                armed: true,
            };
            let acquired: bool =
                sqlx::query_scalar("SELECT pg_try_advisory_lock(hashtextextended($1, 0))")
                    .bind(name)
                    .fetch_one(&mut *guard.conn)
                    .await
                    .map_err(|e| StoreError::Lock {
                        name: name.to_string(),
                        reason: e.to_string(),
                    })?;
            if acquired {
                return Ok(Box::new(guard));
            }

            guard.armed = false;
            drop(guard);
            tokio::time::sleep(pause).await;
            pause = (pause * 2).min(POLL_MAX);
        }
    }
}

/// Outbox writer bound to a [`PgTransaction`].
#[derive(Clone)]
pub struct PgOutboxWriter {
    tx: PgTransaction,
}

impl PgOutboxWriter {
    /// Creates a writer for `tx`.
    pub fn new(tx: PgTransaction) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl OutboxWriter for PgOutboxWriter {
    async fn append(&self, record: OutboxRecord) -> Result<()> {
        let mut conn = self.tx.connection().await?;
        sqlx::query(
            r#"
            INSERT INTO outbox (id, source, transport, event_type, payload, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id)
        .bind(&record.source)
        .bind(&record.transport)
        .bind(&record.event_type)
        .bind(&record.payload)
        .bind(record.created_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}

/// Relay-facing outbox reader.
#[derive(Clone)]
pub struct PgOutboxReader {
    pool: PgPool,
}

impl PgOutboxReader {
    /// Creates a reader over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: PgRow) -> Result<OutboxRecord> {
        Ok(OutboxRecord {
            id: row.try_get("id")?,
            source: row.try_get("source")?,
            transport: row.try_get("transport")?,
            event_type: row.try_get("event_type")?,
            payload: row.try_get("payload")?,
            created_at: row.try_get("created_at")?,
            published_at: row.try_get::<Option<DateTime<Utc>>, _>("published_at")?,
        })
    }
}

#[async_trait]
impl OutboxReader for PgOutboxReader {
    async fn pending(&self, limit: usize) -> Result<Vec<OutboxRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, source, transport, event_type, payload, created_at, published_at
            FROM outbox
            WHERE published_at IS NULL
            ORDER BY created_at ASC, id ASC
            LIMIT $1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn mark_published(&self, ids: &[Uuid]) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE outbox SET published_at = now() WHERE id = ANY($1) AND published_at IS NULL",
        )
        .bind(ids)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
