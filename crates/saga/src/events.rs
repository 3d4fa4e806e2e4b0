//! Workflow history events.

use chrono::{DateTime, Utc};
use common::UserId;
use serde::{Deserialize, Serialize};

/// Events recorded in a workflow's history, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WorkflowEvent {
    /// The workflow was accepted.
    WorkflowStarted(WorkflowStartedData),

    /// The wake-up instant was fixed before sleeping.
    TimerScheduled(TimerScheduledData),

    /// The grace period elapsed.
    TimerFired(TimerFiredData),

    /// One activity attempt failed.
    ActivityAttemptFailed(AttemptFailedData),

    /// The activity succeeded.
    ActivityCompleted(ActivityCompletedData),

    /// The workflow finished successfully.
    WorkflowCompleted(WorkflowCompletedData),

    /// The retry budget was exhausted.
    WorkflowFailed(WorkflowFailedData),

    /// An operator asked for a failed workflow to run again.
    WorkflowRetried(WorkflowRetriedData),
}

impl WorkflowEvent {
    /// Types of the events that can end a history.
    pub const TERMINAL_TYPES: [&'static str; 2] = ["WorkflowCompleted", "WorkflowFailed"];

    /// True if a history ending in this event needs no runner.
    pub fn is_terminal(&self) -> bool {
        Self::TERMINAL_TYPES.contains(&self.event_type())
    }

    /// Stable name of the event, also stored alongside its payload.
    pub fn event_type(&self) -> &'static str {
        match self {
            WorkflowEvent::WorkflowStarted(_) => "WorkflowStarted",
            WorkflowEvent::TimerScheduled(_) => "TimerScheduled",
            WorkflowEvent::TimerFired(_) => "TimerFired",
            WorkflowEvent::ActivityAttemptFailed(_) => "ActivityAttemptFailed",
            WorkflowEvent::ActivityCompleted(_) => "ActivityCompleted",
            WorkflowEvent::WorkflowCompleted(_) => "WorkflowCompleted",
            WorkflowEvent::WorkflowFailed(_) => "WorkflowFailed",
            WorkflowEvent::WorkflowRetried(_) => "WorkflowRetried",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStartedData {
    pub workflow_id: String,
    /// The user to hard-delete.
    pub user_id: UserId,
    /// Grace period fixed at start, so a restart with another setting
    /// does not move the deadline.
    pub grace_period_ms: u64,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerScheduledData {
    pub wake_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerFiredData {
    pub fired_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptFailedData {
    pub activity: String,
    /// 1-based attempt number within the current budget.
    pub attempt: u32,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityCompletedData {
    pub activity: String,
    pub attempt: u32,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowCompletedData {
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowFailedData {
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRetriedData {
    pub retried_at: DateTime<Utc>,
}

impl WorkflowEvent {
    pub fn workflow_started(
        workflow_id: impl Into<String>,
        user_id: UserId,
        grace_period_ms: u64,
    ) -> Self {
        WorkflowEvent::WorkflowStarted(WorkflowStartedData {
            workflow_id: workflow_id.into(),
            user_id,
            grace_period_ms,
            started_at: Utc::now(),
        })
    }

    pub fn timer_scheduled(wake_at: DateTime<Utc>) -> Self {
        WorkflowEvent::TimerScheduled(TimerScheduledData { wake_at })
    }

    pub fn timer_fired() -> Self {
        WorkflowEvent::TimerFired(TimerFiredData {
            fired_at: Utc::now(),
        })
    }

    pub fn attempt_failed(activity: impl Into<String>, attempt: u32, error: impl Into<String>) -> Self {
        WorkflowEvent::ActivityAttemptFailed(AttemptFailedData {
            activity: activity.into(),
            attempt,
            error: error.into(),
            failed_at: Utc::now(),
        })
    }

    pub fn activity_completed(activity: impl Into<String>, attempt: u32) -> Self {
        WorkflowEvent::ActivityCompleted(ActivityCompletedData {
            activity: activity.into(),
            attempt,
            completed_at: Utc::now(),
        })
    }

    pub fn workflow_completed() -> Self {
        WorkflowEvent::WorkflowCompleted(WorkflowCompletedData {
            completed_at: Utc::now(),
        })
    }

    pub fn workflow_failed(reason: impl Into<String>) -> Self {
        WorkflowEvent::WorkflowFailed(WorkflowFailedData {
            reason: reason.into(),
            failed_at: Utc::now(),
        })
    }

    pub fn workflow_retried() -> Self {
        WorkflowEvent::WorkflowRetried(WorkflowRetriedData {
            retried_at: Utc::now(),
        })
    }
}
