//! Storage adapters for the consistency services.
//!
//! Two interchangeable back ends expose the same unit-of-work factories:
//!
//! - [`MemoryDatabase`]: staged in-memory tables and process-local locks,
//!   used by tests and when no database is configured.
//! - [`PgDatabase`]: PostgreSQL tables sharing one `sqlx` transaction per unit
//!   of work, with advisory locks as the distributed named-lock namespace.

pub mod memory;
pub mod postgres;

pub use memory::{
    MemoryAccountProvider, MemoryDatabase, MemoryNotificationProvider, MemoryOrderProvider,
    MemoryProductProvider, MemoryUnitOfWorkFor, MemoryUserProvider,
};
pub use postgres::{
    PgAccountProvider, PgDatabase, PgNotificationProvider, PgOrderProvider, PgProductProvider,
    PgUnitOfWorkFor, PgUserProvider,
};
