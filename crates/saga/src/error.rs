//! Workflow error types.

use std::time::Duration;

use domain::DomainError;
use thiserror::Error;

use crate::state::WorkflowState;

/// Errors raised by the workflow service and its history store.
#[derive(Debug, Error)]
pub enum SagaError {
    /// A workflow with this id already exists.
    #[error("Workflow already started: {0}")]
    AlreadyStarted(String),

    /// No history exists for this id.
    #[error("Workflow not found: {0}")]
    NotFound(String),

    /// The workflow is in the wrong state for the requested operation.
    #[error("Invalid workflow state: expected {expected}, actual {actual}")]
    InvalidState {
        expected: WorkflowState,
        actual: WorkflowState,
    },

    /// Another writer appended to the history first.
    #[error("Concurrency conflict on workflow {workflow_id}: expected sequence {expected}, actual {actual}")]
    ConcurrencyConflict {
        workflow_id: String,
        expected: u64,
        actual: u64,
    },

    /// The history does not begin with a start event, or an event is not a
    /// legal step from the state before it.
    #[error("Corrupt workflow history: {0}")]
    CorruptHistory(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SagaError {
    pub fn is_already_started(&self) -> bool {
        matches!(self, SagaError::AlreadyStarted(_))
    }
}

/// Failure of a single activity attempt.
#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("Activity timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("{0}")]
    Failed(String),
}

/// Convenience type alias for workflow results.
pub type Result<T> = std::result::Result<T, SagaError>;
