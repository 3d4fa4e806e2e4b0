//! In-memory implementations for tests and database-less deployments.
//!
//! A [`MemoryTransaction`] stages writes per table and applies them all on
//! commit. Reads through a [`StagedTable`] see the committed rows overlaid
//! with the transaction's own pending writes.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, PoisonError};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::lock::{LockGuard, Locker};
use crate::outbox::{OutboxReader, OutboxRecord, OutboxWriter};
use crate::uow::{UnitOfWork, finish, run_guarded};
use crate::{Result, StoreError};

/// Committed rows of one table.
pub struct MemoryTable<K, V> {
    rows: Arc<RwLock<BTreeMap<K, V>>>,
}

impl<K, V> Clone for MemoryTable<K, V> {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows.clone(),
        }
    }
}

impl<K, V> Default for MemoryTable<K, V> {
    fn default() -> Self {
        Self {
            rows: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }
}

impl<K, V> MemoryTable<K, V>
where
    K: Ord + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of committed rows.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Returns true if the table has no committed rows.
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Returns a committed row.
    pub async fn get(&self, key: &K) -> Option<V> {
        self.rows.read().await.get(key).cloned()
    }

    /// Returns all committed rows in key order.
    pub async fn values(&self) -> Vec<V> {
        self.rows.read().await.values().cloned().collect()
    }

    /// Mutates a committed row outside any transaction. Returns false if absent.
    pub async fn update<F>(&self, key: &K, f: F) -> bool
    where
        F: FnOnce(&mut V),
    {
        match self.rows.write().await.get_mut(key) {
            Some(row) => {
                f(row);
                true
            }
            None => false,
        }
    }

    /// Opens a staged view of this table within `tx`.
    ///
    /// Call once per table per transaction and clone the result; every
    /// clone shares the same pending writes.
    pub fn stage(&self, tx: &MemoryTransaction) -> StagedTable<K, V> {
        let staged = StagedTable {
            table: self.clone(),
            pending: Arc::new(Mutex::new(BTreeMap::new())),
        };
        tx.register(Arc::new(staged.clone()));
        staged
    }
}

/// Transaction-scoped view of a [`MemoryTable`].
pub struct StagedTable<K, V> {
    table: MemoryTable<K, V>,
    pending: Arc<Mutex<BTreeMap<K, Option<V>>>>,
}

impl<K, V> Clone for StagedTable<K, V> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            pending: self.pending.clone(),
        }
    }
}

impl<K, V> StagedTable<K, V>
where
    K: Ord + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Reads a row, preferring this transaction's pending write.
    pub async fn get(&self, key: &K) -> Option<V> {
        if let Some(staged) = self.pending.lock().await.get(key) {
            return staged.clone();
        }
        self.table.get(key).await
    }

    /// Returns every visible row matching `predicate`, in key order of the
    /// committed rows followed by pending inserts.
    pub async fn filter<P>(&self, predicate: P) -> Vec<V>
    where
        P: Fn(&V) -> bool + Send,
    {
        let pending = self.pending.lock().await;
        let rows = self.table.rows.read().await;

        let committed = rows
            .iter()
            .filter(|(key, _)| !pending.contains_key(*key))
            .map(|(_, row)| row);
        let staged = pending.values().filter_map(Option::as_ref);

        committed
            .chain(staged)
            .filter(|row| predicate(row))
            .cloned()
            .collect()
    }

    /// Returns the first visible row matching `predicate`.
    pub async fn find<P>(&self, predicate: P) -> Option<V>
    where
        P: Fn(&V) -> bool + Send,
    {
        self.filter(predicate).await.into_iter().next()
    }

    /// Stages an insert or replacement.
    pub async fn put(&self, key: K, row: V) {
        self.pending.lock().await.insert(key, Some(row));
    }

    /// Stages a removal.
    pub async fn remove(&self, key: &K) {
        self.pending.lock().await.insert(key.clone(), None);
    }
}

#[async_trait]
trait Staged: Send + Sync {
    async fn apply(&self);
}

#[async_trait]
impl<K, V> Staged for StagedTable<K, V>
where
    K: Ord + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn apply(&self) {
        let mut pending = self.pending.lock().await;
        let mut rows = self.table.rows.write().await;
        for (key, change) in std::mem::take(&mut *pending) {
            match change {
                Some(row) => {
                    rows.insert(key, row);
                }
                None => {
                    rows.remove(&key);
                }
            }
        }
    }
}

/// A set of staged tables committed together.
#[derive(Clone, Default)]
pub struct MemoryTransaction {
    staged: Arc<std::sync::Mutex<Vec<Arc<dyn Staged>>>>,
}

impl MemoryTransaction {
    /// Starts an empty transaction.
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, staged: Arc<dyn Staged>) {
        self.staged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(staged);
    }

    fn take_staged(&self) -> Vec<Arc<dyn Staged>> {
        std::mem::take(&mut *self.staged.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Applies every staged write.
    pub async fn commit(&self) -> Result<()> {
        for staged in self.take_staged() {
            staged.apply().await;
        }
        Ok(())
    }

    /// Discards every staged write.
    pub async fn rollback(&self) -> Result<()> {
        self.take_staged();
        Ok(())
    }
}

/// In-memory [`UnitOfWork`].
///
/// The factory builds the transaction-scoped provider, staging the tables
/// it needs against the transaction it is given.
pub struct MemoryUnitOfWork<P> {
    factory: Arc<dyn Fn(&MemoryTransaction) -> P + Send + Sync>,
}

impl<P> Clone for MemoryUnitOfWork<P> {
    fn clone(&self) -> Self {
        Self {
            factory: self.factory.clone(),
        }
    }
}

impl<P> MemoryUnitOfWork<P> {
    /// Creates a unit of work from a provider factory.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&MemoryTransaction) -> P + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
        }
    }
}

#[async_trait]
impl<P: Send + 'static> UnitOfWork for MemoryUnitOfWork<P> {
    type Provider = P;

    async fn execute<T, E, F, Fut>(&self, work: F) -> std::result::Result<T, E>
    where
        T: Send,
        E: From<StoreError> + Send,
        F: FnOnce(Self::Provider) -> Fut + Send,
        Fut: Future<Output = std::result::Result<T, E>> + Send,
    {
        let tx = MemoryTransaction::new();
        let provider = (self.factory)(&tx);
        let result = run_guarded(async move { work(provider).await }).await;
        finish(result, tx.commit(), tx.rollback()).await
    }
}

/// Process-local named locks.
///
/// A name's mutex lives in the map only while someone holds or awaits it.
#[derive(Clone, Default)]
pub struct MemoryLocker {
    locks: LockMap,
}

type LockMap = Arc<std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>>;

impl MemoryLocker {
    /// Creates an empty lock namespace.
    pub fn new() -> Self {
        Self::default()
    }
}

struct MemoryLockGuard {
    name: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: LockMap,
}

impl MemoryLockGuard {
    fn unlock(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        drop(guard);

        // Waiters clone the mutex under the map lock, so a count of one
        // means the map holds the only reference.
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.name)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
        {
            locks.remove(&self.name);
        }
    }
}

#[async_trait]
impl LockGuard for MemoryLockGuard {
    fn name(&self) -> &str {
        &self.name
    }

    async fn release(&mut self) -> Result<()> {
        self.unlock();
        Ok(())
    }
}

impl Drop for MemoryLockGuard {
    fn drop(&mut self) {
        self.unlock();
    }
}

#[async_trait]
impl Locker for MemoryLocker {
    async fn lock(&self, name: &str) -> Result<Box<dyn LockGuard>> {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(name.to_string()).or_default().clone()
        };
        let guard = mutex.lock_owned().await;
        Ok(Box::new(MemoryLockGuard {
            name: name.to_string(),
            guard: Some(guard),
            locks: self.locks.clone(),
        }))
    }
}

/// In-memory outbox table.
#[derive(Clone, Default)]
pub struct MemoryOutbox {
    records: MemoryTable<Uuid, OutboxRecord>,
}

impl MemoryOutbox {
    /// Creates an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a writer bound to `tx`.
    pub fn writer(&self, tx: &MemoryTransaction) -> MemoryOutboxWriter {
        MemoryOutboxWriter {
            records: self.records.stage(tx),
        }
    }

    /// Returns every committed record, oldest first.
    pub async fn records(&self) -> Vec<OutboxRecord> {
        let mut records = self.records.values().await;
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        records
    }

    /// Returns committed records with the given type tag, oldest first.
    pub async fn records_of_type(&self, event_type: &str) -> Vec<OutboxRecord> {
        self.records()
            .await
            .into_iter()
            .filter(|record| record.event_type == event_type)
            .collect()
    }
}

#[async_trait]
impl OutboxReader for MemoryOutbox {
    async fn pending(&self, limit: usize) -> Result<Vec<OutboxRecord>> {
        Ok(self
            .records()
            .await
            .into_iter()
            .filter(|record| record.published_at.is_none())
            .take(limit)
            .collect())
    }

    async fn mark_published(&self, ids: &[Uuid]) -> Result<u64> {
        let now = chrono::Utc::now();
        let mut updated = 0;
        for id in ids {
            let mut changed = false;
            self.records
                .update(id, |record| {
                    if record.published_at.is_none() {
                        record.published_at = Some(now);
                        changed = true;
                    }
                })
                .await;
            if changed {
                updated += 1;
            }
        }
        Ok(updated)
    }
}

/// Transaction-scoped writer for [`MemoryOutbox`].
#[derive(Clone)]
pub struct MemoryOutboxWriter {
    records: StagedTable<Uuid, OutboxRecord>,
}

#[async_trait]
impl OutboxWriter for MemoryOutboxWriter {
    async fn append(&self, record: OutboxRecord) -> Result<()> {
        self.records.put(record.id, record).await;
        Ok(())
    }
}
