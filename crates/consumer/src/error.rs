//! Consumer error types.

use domain::DomainError;
use saga::SagaError;
use thiserror::Error;

/// Errors a handler can return for a delivery.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// The body does not decode into the event's payload.
    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] SagaError),
}

impl ConsumerError {
    /// Malformed deliveries will never succeed, so they are not requeued.
    pub fn is_malformed(&self) -> bool {
        matches!(self, ConsumerError::Malformed(_))
    }
}

pub type Result<T> = std::result::Result<T, ConsumerError>;
