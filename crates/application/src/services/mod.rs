//! Application services.
//!
//! Each service is exposed as an object-safe trait so transports, consumers
//! and saga activities can hold an `Arc<dyn ...>`, with one generic
//! implementation over any [`store::LockableUnitOfWork`] whose provider
//! offers the repositories the use case needs.

mod account;
mod notification;
mod order;
mod product;
mod user;

pub use account::{AccountAppService, AccountService};
pub use notification::{NotificationAppService, NotificationService};
pub use order::{OrderAppService, OrderService};
pub use product::{ProductAppService, ProductService};
pub use user::{UserAppService, UserService};
