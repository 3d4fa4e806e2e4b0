use common::UserId;

use super::{
    Account, AccountBalanceUpdated, AccountCreated, AccountDeleted, AccountRepository, AccountSpec,
};
use crate::event::EventDispatcher;
use crate::{DomainError, Result};

/// Domain service for the account aggregate.
pub struct AccountDomainService<R, D> {
    repository: R,
    dispatcher: D,
}

impl<R: AccountRepository, D: EventDispatcher> AccountDomainService<R, D> {
    /// Creates a service over a transaction-scoped repository and dispatcher.
    pub fn new(repository: R, dispatcher: D) -> Self {
        Self {
            repository,
            dispatcher,
        }
    }

    /// Finds the account of `user_id`.
    pub async fn find_account(&self, user_id: UserId) -> Result<Account> {
        self.repository.find(&AccountSpec::by_user(user_id)).await
    }

    /// Opens the account of `user_id`. A user has at most one account.
    #[tracing::instrument(skip(self))]
    pub async fn create_account(&self, user_id: UserId, balance: i64) -> Result<UserId> {
        match self.repository.find(&AccountSpec::by_user(user_id)).await {
            Ok(_) => return Err(DomainError::already_used("account", "user_id")),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        let id = self.repository.next_id(user_id).await?;
        let now = common::time::now();
        self.repository
            .store(&Account {
                user_id: id,
                balance,
                created_at: now,
                updated_at: now,
            })
            .await?;

        self.dispatcher
            .dispatch(&AccountCreated {
                user_id: id,
                balance,
                created_at: now,
            })
            .await?;
        Ok(id)
    }

    /// Sets the balance of an existing account. Equal balances are a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn update_balance(&self, user_id: UserId, balance: i64) -> Result<()> {
        let mut account = self.repository.find(&AccountSpec::by_user(user_id)).await?;
        if account.balance == balance {
            return Ok(());
        }

        let now = common::time::now();
        account.balance = balance;
        account.updated_at = now;
        self.repository.store(&account).await?;

        self.dispatcher
            .dispatch(&AccountBalanceUpdated {
                user_id,
                balance,
                updated_at: now,
            })
            .await
    }

    /// Creates the account if absent, otherwise updates its balance.
    #[tracing::instrument(skip(self))]
    pub async fn store_balance(&self, user_id: UserId, balance: i64) -> Result<()> {
        match self.repository.find(&AccountSpec::by_user(user_id)).await {
            Ok(_) => self.update_balance(user_id, balance).await,
            Err(err) if err.is_not_found() => self.create_account(user_id, balance).await.map(|_| ()),
            Err(err) => Err(err),
        }
    }

    /// Removes the account of `user_id`. Absent accounts are a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn delete_account(&self, user_id: UserId) -> Result<()> {
        match self.repository.find(&AccountSpec::by_user(user_id)).await {
            Ok(_) => {}
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err),
        }

        self.repository.delete(user_id).await?;
        self.dispatcher
            .dispatch(&AccountDeleted {
                user_id,
                hard: true,
                deleted_at: common::time::now(),
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordingDispatcher;
    use crate::account::MemoryAccountRepository;
    use store::{MemoryTable, MemoryTransaction};

    fn service() -> (
        AccountDomainService<MemoryAccountRepository, RecordingDispatcher>,
        RecordingDispatcher,
    ) {
        let table = MemoryTable::new();
        let tx = MemoryTransaction::new();
        let dispatcher = RecordingDispatcher::new();
        let service = AccountDomainService::new(
            MemoryAccountRepository::new(table.stage(&tx)),
            dispatcher.clone(),
        );
        (service, dispatcher)
    }

    #[tokio::test]
    async fn store_balance_creates_then_updates() {
        let (service, dispatcher) = service();
        let user_id = UserId::new();

        service.store_balance(user_id, 100).await.unwrap();
        service.store_balance(user_id, 100).await.unwrap();
        service.store_balance(user_id, 250).await.unwrap();

        assert_eq!(
            dispatcher.event_types().await,
            vec!["account_created", "account_balance_updated"]
        );
        let updated = dispatcher.events_of::<AccountBalanceUpdated>().await;
        assert_eq!(updated[0].balance, 250);
        assert_eq!(service.find_account(user_id).await.unwrap().balance, 250);
    }

    #[tokio::test]
    async fn negative_balance_is_accepted() {
        let (service, _) = service();
        let user_id = UserId::new();
        service.store_balance(user_id, -40).await.unwrap();
        assert_eq!(service.find_account(user_id).await.unwrap().balance, -40);
    }

    #[tokio::test]
    async fn second_account_for_user_is_rejected() {
        let (service, dispatcher) = service();
        let user_id = UserId::new();
        service.create_account(user_id, 0).await.unwrap();

        let err = service.create_account(user_id, 5).await.unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(dispatcher.len().await, 1);
    }

    #[tokio::test]
    async fn update_of_missing_account_is_not_found() {
        let (service, _) = service();
        let err = service.update_balance(UserId::new(), 1).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete_is_hard_and_idempotent() {
        let (service, dispatcher) = service();
        let user_id = UserId::new();
        service.create_account(user_id, 10).await.unwrap();

        service.delete_account(user_id).await.unwrap();
        service.delete_account(user_id).await.unwrap();

        let deleted = dispatcher.events_of::<AccountDeleted>().await;
        assert_eq!(deleted.len(), 1);
        assert!(deleted[0].hard);
        assert!(service.find_account(user_id).await.unwrap_err().is_not_found());
    }
}
