//! Named-resource locking.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::Result;

/// A held named lock.
#[async_trait]
pub trait LockGuard: Send + Sync {
    /// Name of the locked resource.
    fn name(&self) -> &str;

    /// Releases the lock. Releasing twice is a no-op.
    async fn release(&mut self) -> Result<()>;
}

/// A namespace of named mutexes.
///
/// `lock` blocks until the name is free; there is no timeout at this
/// layer, callers wrap the future in `tokio::time::timeout` if they need one.
#[async_trait]
pub trait Locker: Send + Sync {
    /// Acquires the lock for `name`.
    async fn lock(&self, name: &str) -> Result<Box<dyn LockGuard>>;
}

#[async_trait]
impl<T: Locker + ?Sized> Locker for Arc<T> {
    async fn lock(&self, name: &str) -> Result<Box<dyn LockGuard>> {
        (**self).lock(name).await
    }
}

/// A set of locks acquired in a deterministic order.
///
/// Names are sorted and deduplicated before acquisition so that two callers
/// with overlapping sets can never wait on each other in a cycle. Locks are
/// released in reverse acquisition order.
pub struct LockSet {
    guards: Vec<Box<dyn LockGuard>>,
}

impl LockSet {
    /// Returns the acquisition order for a list of lock names.
    pub fn ordered(names: &[String]) -> Vec<String> {
        let mut ordered = names.to_vec();
        ordered.sort();
        ordered.dedup();
        ordered
    }

    /// Acquires every lock in `names`.
    ///
    /// If any acquisition fails, the locks already held are released before
    /// the error is returned.
    #[tracing::instrument(skip(locker))]
    pub async fn acquire<L: Locker + ?Sized>(locker: &L, names: &[String]) -> Result<Self> {
        let started = Instant::now();
        let mut set = Self { guards: Vec::new() };

        for name in Self::ordered(names) {
            match locker.lock(&name).await {
                Ok(guard) => set.guards.push(guard),
                Err(err) => {
                    if let Err(release_err) = set.release().await {
                        tracing::warn!(error = %release_err, "failed to release partial lock set");
                    }
                    return Err(err);
                }
            }
        }

        metrics::histogram!("lock_wait_seconds").record(started.elapsed().as_secs_f64());
        Ok(set)
    }

    /// Names of the held locks in acquisition order.
    pub fn names(&self) -> Vec<&str> {
        self.guards.iter().map(|guard| guard.name()).collect()
    }

    /// Releases all locks, newest first. Every lock is attempted; the first
    /// failure is returned.
    pub async fn release(mut self) -> Result<()> {
        let mut first_error = None;
        while let Some(mut guard) = self.guards.pop() {
            if let Err(err) = guard.release().await {
                tracing::warn!(lock = guard.name(), error = %err, "failed to release lock");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
