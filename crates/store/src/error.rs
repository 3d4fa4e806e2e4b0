use thiserror::Error;

/// Errors raised by the transactional infrastructure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No serializer is registered for the event type tag.
    #[error("No serializer registered for event type '{0}'")]
    UnregisteredEvent(String),

    /// The serializer registered for a tag received a different event type.
    #[error("Serializer for event type '{0}' received an event of another type")]
    EventMismatch(String),

    /// An outbox record is missing a required field.
    #[error("Invalid outbox record: {0} is required")]
    InvalidRecord(&'static str),

    /// A named lock could not be acquired or released.
    #[error("Lock '{name}' failed: {reason}")]
    Lock { name: String, reason: String },

    /// The transaction was already committed or rolled back.
    #[error("Transaction is no longer active")]
    TransactionClosed,

    /// The unit of work callback panicked; the transaction was rolled back.
    #[error("Unit of work panicked: {0}")]
    Panicked(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
