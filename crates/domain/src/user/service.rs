//! User invariants: unique login, unique email, status/deleted-at coupling.

use common::UserId;

use super::{User, UserCreated, UserData, UserDeleted, UserRepository, UserSpec, UserStatus, UserUpdated};
use crate::event::{EventDispatcher, FieldChange};
use crate::{DomainError, Result};

/// Domain service for the user aggregate.
pub struct UserDomainService<R, D> {
    repository: R,
    dispatcher: D,
}

impl<R: UserRepository, D: EventDispatcher> UserDomainService<R, D> {
    /// Creates a service over a transaction-scoped repository and dispatcher.
    pub fn new(repository: R, dispatcher: D) -> Self {
        Self {
            repository,
            dispatcher,
        }
    }

    /// Finds a user.
    pub async fn find_user(&self, spec: &UserSpec) -> Result<User> {
        self.repository.find(spec).await
    }

    /// Registers a user under a unique login.
    #[tracing::instrument(skip(self))]
    pub async fn create_user(&self, login: &str, status: UserStatus) -> Result<UserId> {
        self.ensure_unused(UserSpec::by_login(login), None, "login")
            .await?;

        let id = self.repository.next_id().await?;
        let now = common::time::now();
        let user = User {
            id,
            login: login.to_string(),
            email: None,
            telegram: None,
            status,
            created_at: now,
            updated_at: now,
            deleted_at: (status == UserStatus::Deleted).then_some(now),
        };
        self.repository.store(&user).await?;

        self.dispatcher
            .dispatch(&UserCreated {
                user_id: id,
                login: user.login,
                status,
                created_at: now,
            })
            .await?;

        tracing::info!(%id, "user created");
        Ok(id)
    }

    /// Brings a user to the desired field values.
    ///
    /// Nothing is stored or dispatched when no field differs.
    #[tracing::instrument(skip(self))]
    pub async fn update_user(&self, id: UserId, data: UserData) -> Result<()> {
        let current = self.repository.find(&UserSpec::by_id(id)).await?;

        if data.login != current.login {
            self.ensure_unused(UserSpec::by_login(&data.login), Some(id), "login")
                .await?;
        }
        if let Some(email) = &data.email
            && current.email.as_ref() != Some(email)
        {
            self.ensure_unused(UserSpec::by_email(email), Some(id), "email")
                .await?;
        }

        let now = common::time::now();
        let event = UserUpdated {
            user_id: id,
            login: FieldChange::diff(&current.login, &data.login),
            status: FieldChange::diff(&current.status, &data.status),
            email: FieldChange::diff_optional(&current.email, &data.email),
            telegram: FieldChange::diff_optional(&current.telegram, &data.telegram),
            updated_at: now,
        };
        if !event.has_changes() {
            tracing::debug!(%id, "user unchanged");
            return Ok(());
        }

        let mut user = current;
        if event.status.is_changed() {
            user.deleted_at = (data.status == UserStatus::Deleted).then_some(now);
        }
        user.login = data.login;
        user.email = data.email;
        user.telegram = data.telegram;
        user.status = data.status;
        user.updated_at = now;
        self.repository.store(&user).await?;

        self.dispatcher.dispatch(&event).await?;
        Ok(())
    }

    /// Sets or clears the email.
    pub async fn update_user_email(&self, id: UserId, email: Option<String>) -> Result<()> {
        let current = self.repository.find(&UserSpec::by_id(id)).await?;
        self.update_user(
            id,
            UserData {
                email,
                ..current.data()
            },
        )
        .await
    }

    /// Sets or clears the telegram handle.
    pub async fn update_user_telegram(&self, id: UserId, telegram: Option<String>) -> Result<()> {
        let current = self.repository.find(&UserSpec::by_id(id)).await?;
        self.update_user(
            id,
            UserData {
                telegram,
                ..current.data()
            },
        )
        .await
    }

    /// Changes the status, keeping `deleted_at` in step.
    pub async fn update_user_status(&self, id: UserId, status: UserStatus) -> Result<()> {
        let current = self.repository.find(&UserSpec::by_id(id)).await?;
        self.update_user(
            id,
            UserData {
                status,
                ..current.data()
            },
        )
        .await
    }

    /// Deletes a user.
    ///
    /// A soft delete marks the user `Deleted`; a hard delete removes the row.
    /// Deleting an absent user, or soft-deleting an already deleted one,
    /// succeeds without dispatching.
    #[tracing::instrument(skip(self))]
    pub async fn delete_user(&self, id: UserId, hard: bool) -> Result<()> {
        let mut user = match self.repository.find(&UserSpec::by_id(id)).await {
            Ok(user) => user,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err),
        };

        let now = common::time::now();
        if hard {
            self.repository.hard_delete(id).await?;
        } else {
            if user.status == UserStatus::Deleted {
                return Ok(());
            }
            user.status = UserStatus::Deleted;
            user.deleted_at = Some(now);
            user.updated_at = now;
            self.repository.store(&user).await?;
        }

        self.dispatcher
            .dispatch(&UserDeleted {
                user_id: id,
                hard,
                deleted_at: now,
            })
            .await?;

        tracing::info!(%id, hard, "user deleted");
        Ok(())
    }

    async fn ensure_unused(
        &self,
        spec: UserSpec,
        owner: Option<UserId>,
        field: &'static str,
    ) -> Result<()> {
        match self.repository.find(&spec).await {
            Ok(existing) if Some(existing.id) != owner => {
                metrics::counter!("domain_conflicts_total", "entity" => "user", "field" => field)
                    .increment(1);
                Err(DomainError::already_used("user", field))
            }
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }
}
