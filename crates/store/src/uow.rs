//! Unit of work contracts.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures_util::FutureExt;

use crate::lock::{LockSet, Locker};
use crate::{Result, StoreError};

/// Runs a callback inside a single transaction.
///
/// The callback receives a repository provider bound to the transaction. The
/// transaction commits when the callback returns `Ok`, and rolls back when it
/// returns `Err` or panics. A panic surfaces as [`StoreError::Panicked`].
/// Dropping the returned future rolls the transaction back.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Transaction-scoped repository provider handed to callbacks.
    type Provider: Send;

    /// Executes `work` in a new transaction.
    async fn execute<T, E, F, Fut>(&self, work: F) -> std::result::Result<T, E>
    where
        T: Send,
        E: From<StoreError> + Send,
        F: FnOnce(Self::Provider) -> Fut + Send,
        Fut: Future<Output = std::result::Result<T, E>> + Send;
}

/// A unit of work preceded by named-lock acquisition.
///
/// Locks are taken before the transaction opens and released only after it
/// has committed or rolled back, so the next holder always observes the
/// committed state.
#[async_trait]
pub trait LockableUnitOfWork: Send + Sync {
    /// Transaction-scoped repository provider handed to callbacks.
    type Provider: Send;

    /// Acquires `lock_names`, then executes `work` in a new transaction.
    async fn execute<T, E, F, Fut>(
        &self,
        lock_names: Vec<String>,
        work: F,
    ) -> std::result::Result<T, E>
    where
        T: Send,
        E: From<StoreError> + Send,
        F: FnOnce(Self::Provider) -> Fut + Send,
        Fut: Future<Output = std::result::Result<T, E>> + Send;
}

/// Composes a [`UnitOfWork`] with a [`Locker`].
pub struct LockingUnitOfWork<U, L> {
    uow: U,
    locker: L,
}

impl<U, L> LockingUnitOfWork<U, L> {
    /// Creates a lockable unit of work.
    pub fn new(uow: U, locker: L) -> Self {
        Self { uow, locker }
    }

    /// Returns the wrapped unit of work.
    pub fn inner(&self) -> &U {
        &self.uow
    }
}

#[async_trait]
impl<U, L> LockableUnitOfWork for LockingUnitOfWork<U, L>
where
    U: UnitOfWork,
    L: Locker,
{
    type Provider = U::Provider;

    async fn execute<T, E, F, Fut>(
        &self,
        lock_names: Vec<String>,
        work: F,
    ) -> std::result::Result<T, E>
    where
        T: Send,
        E: From<StoreError> + Send,
        F: FnOnce(Self::Provider) -> Fut + Send,
        Fut: Future<Output = std::result::Result<T, E>> + Send,
    {
        let locks = LockSet::acquire(&self.locker, &lock_names).await?;
        let result = self.uow.execute(work).await;
        let released = locks.release().await;

        match (result, released) {
            (Ok(_), Err(err)) => Err(err.into()),
            (result, _) => result,
        }
    }
}

/// Runs a callback future, converting a panic into an error.
pub(crate) async fn run_guarded<T, E, Fut>(work: Fut) -> std::result::Result<T, E>
where
    E: From<StoreError>,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    match AssertUnwindSafe(work).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(StoreError::Panicked(panic_message(panic.as_ref())).into()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Records the outcome of a finished transaction.
pub(crate) fn record_outcome(outcome: &'static str) {
    metrics::counter!("uow_transactions_total", "outcome" => outcome).increment(1);
}

/// Commits or rolls back depending on the callback result.
pub(crate) async fn finish<T, E, C, R>(
    result: std::result::Result<T, E>,
    commit: C,
    rollback: R,
) -> std::result::Result<T, E>
where
    E: From<StoreError>,
    C: Future<Output = Result<()>>,
    R: Future<Output = Result<()>>,
{
    match result {
        Ok(value) => {
            commit.await?;
            record_outcome("committed");
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = rollback.await {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            record_outcome("rolled_back");
            Err(err)
        }
    }
}
