//! Durable delayed hard-delete workflow.
//!
//! A soft-deleted user is hard-deleted after a grace period. Each workflow
//! is event-sourced: every step is appended to its history before the next
//! one runs, so a restarted process resumes where the previous one stopped:
//!
//! 1. Schedule the wake-up instant
//! 2. Sleep until it passes
//! 3. Run the hard-delete activity under a bounded retry policy
//!
//! Exhausting the retries leaves the workflow `Failed` for an operator to
//! retry. Nothing is compensated.

pub mod activity;
pub mod error;
pub mod events;
pub mod instance;
pub mod retry;
pub mod service;
pub mod state;
pub mod store;
pub mod timer;

pub use activity::{Activity, HardDeleteUser};
pub use error::{ActivityError, Result, SagaError};
pub use events::WorkflowEvent;
pub use instance::WorkflowInstance;
pub use retry::RetryPolicy;
pub use service::{LocalWorkflowService, WorkflowConfig, WorkflowService};
pub use state::WorkflowState;
pub use store::{MemoryWorkflowStore, PgWorkflowStore, WorkflowStore};
pub use timer::{DurableTimer, TokioTimer};
