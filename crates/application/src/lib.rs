//! Application layer of the consistency services.
//!
//! Every use case runs inside a [`store::LockableUnitOfWork`]: locks named
//! after the resources it touches are taken first, then a transaction-scoped
//! provider hands repositories and an outbox writer to the domain service.
//! Domain events are serialized into the outbox within the same transaction.

pub mod dispatcher;
pub mod integration;
pub mod locks;
pub mod model;
pub mod provider;
pub mod services;

pub use dispatcher::OutboxEventDispatcher;
pub use model::UserInput;
pub use provider::{
    AccountProvider, NotificationProvider, OrderProvider, ProductProvider, UserProvider,
};
pub use services::{
    AccountAppService, AccountService, NotificationAppService, NotificationService,
    OrderAppService, OrderService, ProductAppService, ProductService, UserAppService,
    UserService,
};
