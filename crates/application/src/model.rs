//! Use-case inputs.

use common::UserId;
use domain::user::{UserData, UserStatus};

/// Desired state of a user. Without an id a new user is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInput {
    pub id: Option<UserId>,
    pub login: String,
    pub email: Option<String>,
    pub telegram: Option<String>,
    pub status: UserStatus,
}

impl UserInput {
    /// Returns true if the input sets fields beyond login and status.
    pub fn has_contacts(&self) -> bool {
        self.email.is_some() || self.telegram.is_some()
    }

    pub fn data(&self) -> UserData {
        UserData {
            login: self.login.clone(),
            email: self.email.clone(),
            telegram: self.telegram.clone(),
            status: self.status,
        }
    }
}
