//! Workflow instance rebuilt from its history.

use chrono::{DateTime, Duration, Utc};
use common::UserId;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SagaError};
use crate::events::WorkflowEvent;
use crate::state::WorkflowState;

/// An event-sourced workflow instance.
///
/// `sequence` counts the events applied so far and is the expected
/// sequence for the next append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInstance {
    workflow_id: String,
    user_id: UserId,
    state: WorkflowState,
    started_at: DateTime<Utc>,
    grace_period_ms: u64,
    wake_at: Option<DateTime<Utc>>,
    /// Attempts made within the current retry budget.
    attempts: u32,
    last_error: Option<String>,
    sequence: u64,
}

impl WorkflowInstance {
    /// Replays a history. Fails unless the first event is `WorkflowStarted`.
    pub fn replay(workflow_id: &str, events: &[WorkflowEvent]) -> Result<Self> {
        let Some((WorkflowEvent::WorkflowStarted(started), rest)) = events.split_first() else {
            return Err(SagaError::CorruptHistory(workflow_id.to_string()));
        };

        let mut instance = Self {
            workflow_id: started.workflow_id.clone(),
            user_id: started.user_id,
            state: WorkflowState::Pending,
            started_at: started.started_at,
            grace_period_ms: started.grace_period_ms,
            wake_at: None,
            attempts: 0,
            last_error: None,
            sequence: 1,
        };
        for event in rest {
            instance.apply(event)?;
        }
        Ok(instance)
    }

    /// Applies one event. Fails with `CorruptHistory` if the event is not a
    /// legal next step from the current state; the instance is then unchanged.
    pub fn apply(&mut self, event: &WorkflowEvent) -> Result<()> {
        let Some((_, to)) = Self::step(event).filter(|&(from, to)| {
            self.state == from && (from == to || from.can_transition_to(to))
        }) else {
            tracing::warn!(
                workflow_id = %self.workflow_id,
                state = %self.state,
                event = event.event_type(),
                "illegal workflow transition"
            );
            return Err(SagaError::CorruptHistory(self.workflow_id.clone()));
        };

        match event {
            WorkflowEvent::TimerScheduled(data) => {
                self.wake_at = Some(data.wake_at);
            }
            WorkflowEvent::WorkflowStarted(_)
            | WorkflowEvent::TimerFired(_)
            | WorkflowEvent::WorkflowCompleted(_) => {}
            WorkflowEvent::ActivityAttemptFailed(data) => {
                self.attempts = data.attempt;
                self.last_error = Some(data.error.clone());
            }
            WorkflowEvent::ActivityCompleted(data) => {
                self.attempts = data.attempt;
                self.last_error = None;
            }
            WorkflowEvent::WorkflowFailed(data) => {
                self.last_error = Some(data.reason.clone());
            }
            WorkflowEvent::WorkflowRetried(_) => {
                self.attempts = 0;
            }
        }
        self.state = to;
        self.sequence += 1;
        Ok(())
    }

    /// The state an event requires and the state it leaves behind. Activity
    /// outcomes are recorded without leaving `Executing`; a second start
    /// event is never legal.
    fn step(event: &WorkflowEvent) -> Option<(WorkflowState, WorkflowState)> {
        use WorkflowState::{Completed, Executing, Failed, Pending, Waiting};
        match event {
            WorkflowEvent::WorkflowStarted(_) => None,
            WorkflowEvent::TimerScheduled(_) => Some((Pending, Waiting)),
            WorkflowEvent::TimerFired(_) => Some((Waiting, Executing)),
            WorkflowEvent::ActivityAttemptFailed(_) | WorkflowEvent::ActivityCompleted(_) => {
                Some((Executing, Executing))
            }
            WorkflowEvent::WorkflowCompleted(_) => Some((Executing, Completed)),
            WorkflowEvent::WorkflowFailed(_) => Some((Executing, Failed)),
            WorkflowEvent::WorkflowRetried(_) => Some((Failed, Executing)),
        }
    }
}

impl WorkflowInstance {
    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// When the grace period ends: the scheduled instant once recorded,
    /// otherwise start time plus grace period.
    pub fn wake_at(&self) -> DateTime<Utc> {
        self.wake_at.unwrap_or_else(|| {
            let grace = i64::try_from(self.grace_period_ms)
                .ok()
                .and_then(Duration::try_milliseconds)
                .unwrap_or(Duration::MAX);
            self.started_at
                .checked_add_signed(grace)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        })
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}
