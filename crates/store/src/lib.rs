//! Transactional plumbing shared by every service.
//!
//! - [`UnitOfWork`]: runs a callback inside one transaction and commits or
//!   rolls back depending on its outcome (panics included).
//! - [`LockableUnitOfWork`]: acquires a sorted, deduplicated set of named
//!   locks first and releases them after the transaction has finished.
//! - [`OutboxRecord`] / [`OutboxWriter`]: integration events written in the
//!   same transaction as the state change that produced them.
//! - [`SerializerRegistry`]: maps event type tags to wire serializers.
//!
//! In-memory and PostgreSQL implementations are provided for each contract.

pub mod error;
pub mod lock;
pub mod memory;
pub mod outbox;
pub mod postgres;
pub mod registry;
pub mod uow;

pub use error::{Result, StoreError};
pub use lock::{LockGuard, LockSet, Locker};
pub use memory::{
    MemoryLocker, MemoryOutbox, MemoryOutboxWriter, MemoryTable, MemoryTransaction,
    MemoryUnitOfWork, StagedTable,
};
pub use outbox::{OutboxReader, OutboxRecord, OutboxRecordBuilder, OutboxWriter};
pub use postgres::{PgLocker, PgOutboxReader, PgOutboxWriter, PgTransaction, PgUnitOfWork};
pub use registry::SerializerRegistry;
pub use uow::{LockableUnitOfWork, LockingUnitOfWork, UnitOfWork};
