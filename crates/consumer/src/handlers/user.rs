//! Handlers of the user service.

use std::sync::Arc;

use application::integration::UserDeletedPayload;
use async_trait::async_trait;
use domain::user::UserDeleted;
use saga::WorkflowService;

use crate::delivery::Delivery;
use crate::error::Result;
use crate::handler::{EventHandler, HandlerRegistry};

/// Starts the delayed hard delete after a soft delete.
///
/// The workflow id derives from the correlation id, so a redelivered event
/// finds the workflow already started and is acknowledged.
pub struct UserDeletedHandler {
    workflows: Arc<dyn WorkflowService>,
}

impl UserDeletedHandler {
    pub fn new(workflows: Arc<dyn WorkflowService>) -> Self {
        Self { workflows }
    }
}

/// Workflow id for a soft delete. Falls back to the user id when the
/// delivery carries no correlation id.
pub fn workflow_id(delivery: &Delivery, payload: &UserDeletedPayload) -> String {
    if delivery.correlation_id.is_empty() {
        format!("{}_del", payload.user_id)
    } else {
        format!("{}_del", delivery.correlation_id)
    }
}

#[async_trait]
impl EventHandler for UserDeletedHandler {
    async fn handle(&self, delivery: &Delivery) -> Result<()> {
        let payload: UserDeletedPayload = delivery.decode()?;
        if payload.hard {
            return Ok(());
        }

        let workflow_id = workflow_id(delivery, &payload);
        match self
            .workflows
            .run_user_deleted_workflow(&workflow_id, payload.user_id)
            .await
        {
            Ok(()) => Ok(()),
            Err(err) if err.is_already_started() => {
                tracing::info!(%workflow_id, "hard-delete workflow already started");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

pub fn user_handlers(workflows: Arc<dyn WorkflowService>) -> HandlerRegistry {
    HandlerRegistry::new().register(UserDeleted::EVENT_TYPE, UserDeletedHandler::new(workflows))
}
