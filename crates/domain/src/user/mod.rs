//! User aggregate.

mod events;
mod memory;
mod service;

pub use events::{UserCreated, UserDeleted, UserUpdated};
pub use memory::MemoryUserRepository;
pub use service::UserDomainService;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::UserId;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Lifecycle status of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UserStatus {
    /// The user can sign in and place orders.
    #[default]
    Active,
    /// The user was soft-deleted and awaits hard deletion.
    Deleted,
}

impl UserStatus {
    /// Numeric code used in storage and on the wire.
    pub fn code(&self) -> i16 {
        match self {
            UserStatus::Active => 0,
            UserStatus::Deleted => 1,
        }
    }

    /// Parses a numeric status code.
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(UserStatus::Active),
            1 => Some(UserStatus::Deleted),
            _ => None,
        }
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "Active",
            UserStatus::Deleted => "Deleted",
        }
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered user.
///
/// `deleted_at` is set exactly when `status` is [`UserStatus::Deleted`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub login: String,
    pub email: Option<String>,
    pub telegram: Option<String>,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Returns the caller-editable fields.
    pub fn data(&self) -> UserData {
        UserData {
            login: self.login.clone(),
            email: self.email.clone(),
            telegram: self.telegram.clone(),
            status: self.status,
        }
    }
}

/// Desired state of the caller-editable user fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserData {
    pub login: String,
    pub email: Option<String>,
    pub telegram: Option<String>,
    pub status: UserStatus,
}

/// Sparse filter over users; populated fields are ANDed.
///
/// An empty specification matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserSpec {
    pub id: Option<UserId>,
    pub login: Option<String>,
    pub email: Option<String>,
}

impl UserSpec {
    /// Matches the user with `id`.
    pub fn by_id(id: UserId) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    /// Matches the user holding `login`.
    pub fn by_login(login: impl Into<String>) -> Self {
        Self {
            login: Some(login.into()),
            ..Default::default()
        }
    }

    /// Matches the user holding `email`.
    pub fn by_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Default::default()
        }
    }

    /// Returns true if no field is populated.
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.login.is_none() && self.email.is_none()
    }

    /// Returns true if `user` satisfies every populated field.
    pub fn matches(&self, user: &User) -> bool {
        !self.is_empty()
            && self.id.is_none_or(|id| id == user.id)
            && self.login.as_ref().is_none_or(|login| *login == user.login)
            && self
                .email
                .as_ref()
                .is_none_or(|email| user.email.as_ref() == Some(email))
    }
}

/// Storage of users.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Allocates a new user id.
    async fn next_id(&self) -> Result<UserId>;

    /// Inserts or replaces a user.
    async fn store(&self, user: &User) -> Result<()>;

    /// Returns the first user matching `spec`, or `NotFound`.
    async fn find(&self, spec: &UserSpec) -> Result<User>;

    /// Physically removes a user. Removing an absent user is not an error.
    async fn hard_delete(&self, id: UserId) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        let now = common::time::now();
        User {
            id: UserId::new(),
            login: "alice".to_string(),
            email: Some("alice@example.com".to_string()),
            telegram: None,
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn empty_spec_matches_nothing() {
        assert!(UserSpec::default().is_empty());
        assert!(!UserSpec::default().matches(&user()));
    }

    #[test]
    fn spec_fields_are_anded() {
        let user = user();
        assert!(UserSpec::by_login("alice").matches(&user));
        assert!(UserSpec::by_email("alice@example.com").matches(&user));

        let spec = UserSpec {
            login: Some("alice".to_string()),
            email: Some("other@example.com".to_string()),
            ..Default::default()
        };
        assert!(!spec.matches(&user));
    }

    #[test]
    fn status_codes() {
        for status in [UserStatus::Active, UserStatus::Deleted] {
            assert_eq!(UserStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(UserStatus::from_code(9), None);
    }
}
