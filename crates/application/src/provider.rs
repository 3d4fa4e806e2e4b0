//! Transaction-scoped repository providers.
//!
//! A unit of work builds one provider per transaction. Every handle it
//! returns is bound to that transaction, so repository writes and outbox
//! appends commit or roll back together.

use domain::account::AccountRepository;
use domain::notification::NotificationRepository;
use domain::order::{LocalProductRepository, LocalUserRepository, OrderRepository};
use domain::product::ProductRepository;
use domain::user::UserRepository;
use store::OutboxWriter;

pub trait UserProvider: Send + 'static {
    type Users: UserRepository + 'static;
    type Outbox: OutboxWriter + 'static;

    fn users(&self) -> Self::Users;
    fn outbox(&self) -> Self::Outbox;
}

pub trait AccountProvider: Send + 'static {
    type Accounts: AccountRepository + 'static;
    type Outbox: OutboxWriter + 'static;

    fn accounts(&self) -> Self::Accounts;
    fn outbox(&self) -> Self::Outbox;
}

pub trait ProductProvider: Send + 'static {
    type Products: ProductRepository + 'static;
    type Outbox: OutboxWriter + 'static;

    fn products(&self) -> Self::Products;
    fn outbox(&self) -> Self::Outbox;
}

pub trait OrderProvider: Send + 'static {
    type Orders: OrderRepository + 'static;
    type LocalUsers: LocalUserRepository + 'static;
    type LocalProducts: LocalProductRepository + 'static;
    type Outbox: OutboxWriter + 'static;

    fn orders(&self) -> Self::Orders;
    fn local_users(&self) -> Self::LocalUsers;
    fn local_products(&self) -> Self::LocalProducts;
    fn outbox(&self) -> Self::Outbox;
}

/// Notifications raise no events, so there is no outbox handle.
pub trait NotificationProvider: Send + 'static {
    type Notifications: NotificationRepository + 'static;

    fn notifications(&self) -> Self::Notifications;
}
