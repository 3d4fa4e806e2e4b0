//! PostgreSQL database.

mod account;
mod notification;
mod order;
mod product;
mod user;

pub use account::PgAccountRepository;
pub use notification::PgNotificationRepository;
pub use order::{PgLocalProductRepository, PgLocalUserRepository, PgOrderRepository};
pub use product::PgProductRepository;
pub use user::PgUserRepository;

use std::future::Future;
use std::time::Instant;

use application::{
    AccountProvider, NotificationProvider, OrderProvider, ProductProvider, UserProvider,
};
use domain::DomainError;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use store::{
    LockingUnitOfWork, PgLocker, PgOutboxReader, PgOutboxWriter, PgTransaction, PgUnitOfWork,
    StoreError,
};

/// Lockable unit of work over PostgreSQL.
pub type PgUnitOfWorkFor<P> = LockingUnitOfWork<PgUnitOfWork<P>, PgLocker>;

/// Connection pools plus unit-of-work factories for every service.
///
/// Named locks live on `lock_pool`, apart from the transactions on `pool`,
/// so lock holders can never exhaust the connections their own
/// transactions need.
#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
    lock_pool: PgPool,
}

impl PgDatabase {
    pub fn new(pool: PgPool, lock_pool: PgPool) -> Self {
        Self { pool, lock_pool }
    }

    /// Connects two pools of at most `max_connections` each, one for
    /// transactions and one for held named locks.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        let lock_pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool, lock_pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Closes both pools.
    pub async fn close(&self) {
        self.lock_pool.close().await;
        self.pool.close().await;
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Returns the reader an outbox relay drains.
    pub fn outbox_reader(&self) -> PgOutboxReader {
        PgOutboxReader::new(self.pool.clone())
    }

    pub fn user_unit_of_work(&self) -> PgUnitOfWorkFor<PgUserProvider> {
        self.lockable(|tx| PgUserProvider { tx })
    }

    pub fn account_unit_of_work(&self) -> PgUnitOfWorkFor<PgAccountProvider> {
        self.lockable(|tx| PgAccountProvider { tx })
    }

    pub fn product_unit_of_work(&self) -> PgUnitOfWorkFor<PgProductProvider> {
        self.lockable(|tx| PgProductProvider { tx })
    }

    pub fn order_unit_of_work(&self) -> PgUnitOfWorkFor<PgOrderProvider> {
        self.lockable(|tx| PgOrderProvider { tx })
    }

    pub fn notification_unit_of_work(&self) -> PgUnitOfWorkFor<PgNotificationProvider> {
        self.lockable(|tx| PgNotificationProvider { tx })
    }

    fn lockable<P, F>(&self, factory: F) -> PgUnitOfWorkFor<P>
    where
        F: Fn(PgTransaction) -> P + Send + Sync + 'static,
    {
        LockingUnitOfWork::new(
            PgUnitOfWork::new(self.pool.clone(), factory),
            PgLocker::new(self.lock_pool.clone()),
        )
    }
}

pub struct PgUserProvider {
    tx: PgTransaction,
}

impl UserProvider for PgUserProvider {
    type Users = PgUserRepository;
    type Outbox = PgOutboxWriter;

    fn users(&self) -> Self::Users {
        PgUserRepository::new(self.tx.clone())
    }

    fn outbox(&self) -> Self::Outbox {
        PgOutboxWriter::new(self.tx.clone())
    }
}

pub struct PgAccountProvider {
    tx: PgTransaction,
}

impl AccountProvider for PgAccountProvider {
    type Accounts = PgAccountRepository;
    type Outbox = PgOutboxWriter;

    fn accounts(&self) -> Self::Accounts {
        PgAccountRepository::new(self.tx.clone())
    }

    fn outbox(&self) -> Self::Outbox {
        PgOutboxWriter::new(self.tx.clone())
    }
}

pub struct PgProductProvider {
    tx: PgTransaction,
}

impl ProductProvider for PgProductProvider {
    type Products = PgProductRepository;
    type Outbox = PgOutboxWriter;

    fn products(&self) -> Self::Products {
        PgProductRepository::new(self.tx.clone())
    }

    fn outbox(&self) -> Self::Outbox {
        PgOutboxWriter::new(self.tx.clone())
    }
}

pub struct PgOrderProvider {
    tx: PgTransaction,
}

impl OrderProvider for PgOrderProvider {
    type Orders = PgOrderRepository;
    type LocalUsers = PgLocalUserRepository;
    type LocalProducts = PgLocalProductRepository;
    type Outbox = PgOutboxWriter;

    fn orders(&self) -> Self::Orders {
        PgOrderRepository::new(self.tx.clone())
    }

    fn local_users(&self) -> Self::LocalUsers {
        PgLocalUserRepository::new(self.tx.clone())
    }

    fn local_products(&self) -> Self::LocalProducts {
        PgLocalProductRepository::new(self.tx.clone())
    }

    fn outbox(&self) -> Self::Outbox {
        PgOutboxWriter::new(self.tx.clone())
    }
}

pub struct PgNotificationProvider {
    tx: PgTransaction,
}

impl NotificationProvider for PgNotificationProvider {
    type Notifications = PgNotificationRepository;

    fn notifications(&self) -> Self::Notifications {
        PgNotificationRepository::new(self.tx.clone())
    }
}

/// Runs one query, recording its duration.
pub(crate) async fn timed<T, Fut>(
    operation: &'static str,
    table: &'static str,
    query: Fut,
) -> Result<T, sqlx::Error>
where
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let start = Instant::now();
    let result = query.await;
    let status = if result.is_ok() { "ok" } else { "error" };
    metrics::histogram!(
        "database_query_duration_seconds",
        "operation" => operation,
        "table" => table,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64());
    result
}

pub(crate) fn db_error(err: sqlx::Error) -> DomainError {
    DomainError::Store(StoreError::Database(err))
}

/// Returns the violated unique constraint or index name, if any.
pub(crate) fn unique_violation(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => db_err.constraint(),
        _ => None,
    }
}

pub(crate) fn decode_error(message: String) -> DomainError {
    db_error(sqlx::Error::Decode(message.into()))
}
