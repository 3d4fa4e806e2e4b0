//! Hard-delete workflow inspection and operator retry.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::UserId;
use common::time::to_unix;
use saga::{WorkflowInstance, WorkflowService};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct WorkflowResponse {
    pub workflow_id: String,
    pub user_id: UserId,
    pub state: &'static str,
    pub wake_at: i64,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl From<WorkflowInstance> for WorkflowResponse {
    fn from(instance: WorkflowInstance) -> Self {
        Self {
            workflow_id: instance.workflow_id().to_string(),
            user_id: instance.user_id(),
            state: instance.state().as_str(),
            wake_at: to_unix(instance.wake_at()),
            attempts: instance.attempts(),
            last_error: instance.last_error().map(String::from),
        }
    }
}

/// GET /workflows/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowResponse>, ApiError> {
    let instance = state.workflows.find_workflow(&id).await?;
    Ok(Json(instance.into()))
}

/// POST /workflows/{id}/retry: restarts a failed workflow's activity.
#[tracing::instrument(skip(state))]
pub async fn retry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.workflows.retry_failed(&id).await?;
    tracing::info!(workflow_id = %id, "failed workflow retried by operator");
    Ok(StatusCode::ACCEPTED)
}
