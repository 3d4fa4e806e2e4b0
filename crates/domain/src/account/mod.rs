//! Account (balance) aggregate. One account per user, keyed by the user id.

mod service;

pub use service::AccountDomainService;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::UserId;
use store::StagedTable;

use crate::{DomainError, Result};

/// A user's balance in minor currency units. Negative balances are allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub user_id: UserId,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sparse filter over accounts. An empty specification matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountSpec {
    pub user_id: Option<UserId>,
}

impl AccountSpec {
    /// Matches the account of `user_id`.
    pub fn by_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    /// Returns true if `account` satisfies the populated fields.
    pub fn matches(&self, account: &Account) -> bool {
        self.user_id.is_some_and(|id| id == account.user_id)
    }
}

/// Storage of accounts.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Derives the account identity for `user_id`.
    async fn next_id(&self, user_id: UserId) -> Result<UserId>;

    /// Inserts or replaces an account.
    async fn store(&self, account: &Account) -> Result<()>;

    /// Returns the account matching `spec`, or `NotFound`.
    async fn find(&self, spec: &AccountSpec) -> Result<Account>;

    /// Removes an account. Removing an absent account is not an error.
    async fn delete(&self, user_id: UserId) -> Result<()>;
}

/// An account was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountCreated {
    pub user_id: UserId,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}

domain_event!(AccountCreated, "account_created");

/// An account balance changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountBalanceUpdated {
    pub user_id: UserId,
    pub balance: i64,
    pub updated_at: DateTime<Utc>,
}

domain_event!(AccountBalanceUpdated, "account_balance_updated");

/// An account was removed. Account deletes are always hard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountDeleted {
    pub user_id: UserId,
    pub hard: bool,
    pub deleted_at: DateTime<Utc>,
}

domain_event!(AccountDeleted, "account_deleted");

/// [`AccountRepository`] over a staged in-memory table.
#[derive(Clone)]
pub struct MemoryAccountRepository {
    accounts: StagedTable<UserId, Account>,
}

impl MemoryAccountRepository {
    /// Creates a repository over the transaction's view of the accounts table.
    pub fn new(accounts: StagedTable<UserId, Account>) -> Self {
        Self { accounts }
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    async fn next_id(&self, user_id: UserId) -> Result<UserId> {
        Ok(user_id)
    }

    async fn store(&self, account: &Account) -> Result<()> {
        self.accounts.put(account.user_id, account.clone()).await;
        Ok(())
    }

    async fn find(&self, spec: &AccountSpec) -> Result<Account> {
        let Some(user_id) = spec.user_id else {
            return Err(DomainError::not_found("account"));
        };
        self.accounts
            .get(&user_id)
            .await
            .ok_or_else(|| DomainError::not_found("account"))
    }

    async fn delete(&self, user_id: UserId) -> Result<()> {
        self.accounts.remove(&user_id).await;
        Ok(())
    }
}
