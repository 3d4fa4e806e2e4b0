//! Workflow activities.

use std::sync::Arc;

use application::UserService;
use async_trait::async_trait;
use common::UserId;

use crate::error::ActivityError;

/// An idempotent unit of work invoked by a workflow, keyed by aggregate id.
#[async_trait]
pub trait Activity: Send + Sync {
    /// Name recorded in the workflow history.
    fn name(&self) -> &'static str;

    async fn run(&self, user_id: UserId) -> Result<(), ActivityError>;
}

/// Hard-deletes a user. Deleting an absent user succeeds, so repeating the
/// activity after a crash is harmless.
pub struct HardDeleteUser {
    users: Arc<dyn UserService>,
}

impl HardDeleteUser {
    pub fn new(users: Arc<dyn UserService>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl Activity for HardDeleteUser {
    fn name(&self) -> &'static str {
        "hard_delete_user"
    }

    #[tracing::instrument(skip(self))]
    async fn run(&self, user_id: UserId) -> Result<(), ActivityError> {
        self.users.delete_user(user_id, true).await?;
        Ok(())
    }
}
