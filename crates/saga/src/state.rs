//! Workflow state machine.

use serde::{Deserialize, Serialize};

/// The state of a workflow instance in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► Waiting ──► Executing ──┬──► Completed
///                             ▲       └──► Failed
///                             └──────────────┘ (operator retry)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WorkflowState {
    /// Started, timer not yet scheduled.
    #[default]
    Pending,

    /// Sleeping through the grace period.
    Waiting,

    /// Running the activity under the retry policy.
    Executing,

    /// The activity succeeded (terminal state).
    Completed,

    /// The retry budget was exhausted (terminal until retried).
    Failed,
}

impl WorkflowState {
    /// Returns true if the transition is allowed.
    pub fn can_transition_to(&self, next: WorkflowState) -> bool {
        matches!(
            (self, next),
            (WorkflowState::Pending, WorkflowState::Waiting)
                | (WorkflowState::Waiting, WorkflowState::Executing)
                | (WorkflowState::Executing, WorkflowState::Completed)
                | (WorkflowState::Executing, WorkflowState::Failed)
                | (WorkflowState::Failed, WorkflowState::Executing)
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Completed | WorkflowState::Failed)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Pending => "Pending",
            WorkflowState::Waiting => "Waiting",
            WorkflowState::Executing => "Executing",
            WorkflowState::Completed => "Completed",
            WorkflowState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
