//! Domain error types.

use store::StoreError;
use thiserror::Error;

use crate::order::OrderError;

/// Errors returned by repositories and domain services.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The aggregate does not exist. Existence checks treat this as control flow.
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// A unique field value already belongs to another aggregate.
    #[error("{entity} {field} already used")]
    AlreadyUsed {
        entity: &'static str,
        field: &'static str,
    },

    /// An order failed validation.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Infrastructure failure: storage, serialization, locks or outbox.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl DomainError {
    /// Creates a `NotFound` error for `entity`.
    pub fn not_found(entity: &'static str) -> Self {
        DomainError::NotFound { entity }
    }

    /// Creates an `AlreadyUsed` error for `entity.field`.
    pub fn already_used(entity: &'static str, field: &'static str) -> Self {
        DomainError::AlreadyUsed { entity, field }
    }

    /// Returns true for `NotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DomainError::NotFound { .. })
    }

    /// Returns true for `AlreadyUsed`.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DomainError::AlreadyUsed { .. })
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
