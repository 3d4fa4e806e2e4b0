//! In-memory database.

use application::{
    AccountProvider, NotificationProvider, OrderProvider, ProductProvider, UserProvider,
};
use common::{NotificationId, OrderId, ProductId, UserId};
use domain::account::{Account, MemoryAccountRepository};
use domain::notification::{MemoryNotificationRepository, Notification};
use domain::order::{
    LocalProduct, LocalUser, MemoryLocalProductRepository, MemoryLocalUserRepository,
    MemoryOrderRepository, Order, Replica,
};
use domain::product::{MemoryProductRepository, Product};
use domain::user::{MemoryUserRepository, User};
use store::{
    LockingUnitOfWork, MemoryLocker, MemoryOutbox, MemoryOutboxWriter, MemoryTable,
    MemoryUnitOfWork,
};

/// Lockable unit of work over the in-memory database.
pub type MemoryUnitOfWorkFor<P> = LockingUnitOfWork<MemoryUnitOfWork<P>, MemoryLocker>;

/// Every table of every service, plus one outbox and one lock namespace.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    pub users: MemoryTable<UserId, User>,
    pub accounts: MemoryTable<UserId, Account>,
    pub products: MemoryTable<ProductId, Product>,
    pub orders: MemoryTable<OrderId, Order>,
    pub local_users: MemoryTable<UserId, Replica<LocalUser>>,
    pub local_products: MemoryTable<ProductId, Replica<LocalProduct>>,
    pub notifications: MemoryTable<NotificationId, Notification>,
    pub outbox: MemoryOutbox,
    locker: MemoryLocker,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_unit_of_work(&self) -> MemoryUnitOfWorkFor<MemoryUserProvider> {
        let db = self.clone();
        self.lockable(MemoryUnitOfWork::new(move |tx| MemoryUserProvider {
            users: MemoryUserRepository::new(db.users.stage(tx)),
            outbox: db.outbox.writer(tx),
        }))
    }

    pub fn account_unit_of_work(&self) -> MemoryUnitOfWorkFor<MemoryAccountProvider> {
        let db = self.clone();
        self.lockable(MemoryUnitOfWork::new(move |tx| MemoryAccountProvider {
            accounts: MemoryAccountRepository::new(db.accounts.stage(tx)),
            outbox: db.outbox.writer(tx),
        }))
    }

    pub fn product_unit_of_work(&self) -> MemoryUnitOfWorkFor<MemoryProductProvider> {
        let db = self.clone();
        self.lockable(MemoryUnitOfWork::new(move |tx| MemoryProductProvider {
            products: MemoryProductRepository::new(db.products.stage(tx)),
            outbox: db.outbox.writer(tx),
        }))
    }

    pub fn order_unit_of_work(&self) -> MemoryUnitOfWorkFor<MemoryOrderProvider> {
        let db = self.clone();
        self.lockable(MemoryUnitOfWork::new(move |tx| MemoryOrderProvider {
            orders: MemoryOrderRepository::new(db.orders.stage(tx)),
            local_users: MemoryLocalUserRepository::new(db.local_users.stage(tx)),
            local_products: MemoryLocalProductRepository::new(db.local_products.stage(tx)),
            outbox: db.outbox.writer(tx),
        }))
    }

    pub fn notification_unit_of_work(&self) -> MemoryUnitOfWorkFor<MemoryNotificationProvider> {
        let db = self.clone();
        self.lockable(MemoryUnitOfWork::new(move |tx| MemoryNotificationProvider {
            notifications: MemoryNotificationRepository::new(db.notifications.stage(tx)),
        }))
    }

    fn lockable<P>(&self, uow: MemoryUnitOfWork<P>) -> MemoryUnitOfWorkFor<P> {
        LockingUnitOfWork::new(uow, self.locker.clone())
    }
}

pub struct MemoryUserProvider {
    users: MemoryUserRepository,
    outbox: MemoryOutboxWriter,
}

impl UserProvider for MemoryUserProvider {
    type Users = MemoryUserRepository;
    type Outbox = MemoryOutboxWriter;

    fn users(&self) -> Self::Users {
        self.users.clone()
    }

    fn outbox(&self) -> Self::Outbox {
        self.outbox.clone()
    }
}

pub struct MemoryAccountProvider {
    accounts: MemoryAccountRepository,
    outbox: MemoryOutboxWriter,
}

impl AccountProvider for MemoryAccountProvider {
    type Accounts = MemoryAccountRepository;
    type Outbox = MemoryOutboxWriter;

    fn accounts(&self) -> Self::Accounts {
        self.accounts.clone()
    }

    fn outbox(&self) -> Self::Outbox {
        self.outbox.clone()
    }
}

pub struct MemoryProductProvider {
    products: MemoryProductRepository,
    outbox: MemoryOutboxWriter,
}

impl ProductProvider for MemoryProductProvider {
    type Products = MemoryProductRepository;
    type Outbox = MemoryOutboxWriter;

    fn products(&self) -> Self::Products {
        self.products.clone()
    }

    fn outbox(&self) -> Self::Outbox {
        self.outbox.clone()
    }
}

pub struct MemoryOrderProvider {
    orders: MemoryOrderRepository,
    local_users: MemoryLocalUserRepository,
    local_products: MemoryLocalProductRepository,
    outbox: MemoryOutboxWriter,
}

impl OrderProvider for MemoryOrderProvider {
    type Orders = MemoryOrderRepository;
    type LocalUsers = MemoryLocalUserRepository;
    type LocalProducts = MemoryLocalProductRepository;
    type Outbox = MemoryOutboxWriter;

    fn orders(&self) -> Self::Orders {
        self.orders.clone()
    }

    fn local_users(&self) -> Self::LocalUsers {
        self.local_users.clone()
    }

    fn local_products(&self) -> Self::LocalProducts {
        self.local_products.clone()
    }

    fn outbox(&self) -> Self::Outbox {
        self.outbox.clone()
    }
}

pub struct MemoryNotificationProvider {
    notifications: MemoryNotificationRepository,
}

impl NotificationProvider for MemoryNotificationProvider {
    type Notifications = MemoryNotificationRepository;

    fn notifications(&self) -> Self::Notifications {
        self.notifications.clone()
    }
}
