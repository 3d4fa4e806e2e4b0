use chrono::{DateTime, Utc};
use common::UserId;

use super::UserStatus;
use crate::event::FieldChange;

/// A user was registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCreated {
    pub user_id: UserId,
    pub login: String,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
}

domain_event!(UserCreated, "user_created");

/// Some user fields changed. Only changed fields are populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserUpdated {
    pub user_id: UserId,
    pub login: FieldChange<String>,
    pub status: FieldChange<UserStatus>,
    pub email: FieldChange<String>,
    pub telegram: FieldChange<String>,
    pub updated_at: DateTime<Utc>,
}

domain_event!(UserUpdated, "user_updated");

impl UserUpdated {
    /// Returns true if at least one field changed.
    pub fn has_changes(&self) -> bool {
        self.login.is_changed()
            || self.status.is_changed()
            || self.email.is_changed()
            || self.telegram.is_changed()
    }
}

/// A user was deleted, softly (status flag) or hard (row removed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDeleted {
    pub user_id: UserId,
    pub hard: bool,
    pub deleted_at: DateTime<Utc>,
}

domain_event!(UserDeleted, "user_deleted");
