use async_trait::async_trait;
use common::UserId;
use store::StagedTable;

use super::{User, UserRepository, UserSpec};
use crate::{DomainError, Result};

/// [`UserRepository`] over a staged in-memory table.
#[derive(Clone)]
pub struct MemoryUserRepository {
    users: StagedTable<UserId, User>,
}

impl MemoryUserRepository {
    /// Creates a repository over the transaction's view of the users table.
    pub fn new(users: StagedTable<UserId, User>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn next_id(&self) -> Result<UserId> {
        Ok(UserId::new())
    }

    async fn store(&self, user: &User) -> Result<()> {
        self.users.put(user.id, user.clone()).await;
        Ok(())
    }

    async fn find(&self, spec: &UserSpec) -> Result<User> {
        self.users
            .find(|user| spec.matches(user))
            .await
            .ok_or_else(|| DomainError::not_found("user"))
    }

    async fn hard_delete(&self, id: UserId) -> Result<()> {
        self.users.remove(&id).await;
        Ok(())
    }
}
