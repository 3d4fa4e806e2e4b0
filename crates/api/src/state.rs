//! Shared application state: services, consumers and the workflow runtime.

use std::collections::HashMap;
use std::sync::Arc;

use application::integration;
use application::{
    AccountAppService, AccountService, NotificationAppService, NotificationService,
    OrderAppService, OrderService, ProductAppService, ProductService, UserAppService,
    UserService,
};
use consumer::Consumer;
use consumer::handlers::{notification_handlers, order_handlers, user_handlers};
use persistence::{MemoryDatabase, PgDatabase};
use saga::{
    HardDeleteUser, LocalWorkflowService, MemoryWorkflowStore, PgWorkflowStore, TokioTimer,
    WorkflowConfig, WorkflowStore,
};

/// Builds the service set over any database exposing unit-of-work factories.
macro_rules! services {
    ($db:expr) => {
        Services {
            users: Arc::new(UserAppService::new(
                $db.user_unit_of_work(),
                Arc::new(integration::user_serializers()),
            )),
            accounts: Arc::new(AccountAppService::new(
                $db.account_unit_of_work(),
                Arc::new(integration::account_serializers()),
            )),
            products: Arc::new(ProductAppService::new(
                $db.product_unit_of_work(),
                Arc::new(integration::product_serializers()),
            )),
            orders: Arc::new(OrderAppService::new(
                $db.order_unit_of_work(),
                Arc::new(integration::order_serializers()),
            )),
            notifications: Arc::new(NotificationAppService::new(
                $db.notification_unit_of_work(),
            )),
        }
    };
}

/// Workflow runtime shared by the HTTP routes and the user consumer.
pub type Workflows = LocalWorkflowService<Arc<dyn WorkflowStore>>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub users: Arc<dyn UserService>,
    pub accounts: Arc<dyn AccountService>,
    pub products: Arc<dyn ProductService>,
    pub orders: Arc<dyn OrderService>,
    pub notifications: Arc<dyn NotificationService>,
    pub workflows: Workflows,
    consumers: HashMap<&'static str, Consumer>,
}

impl AppState {
    /// Wires every service over the in-memory database.
    pub fn in_memory(db: &MemoryDatabase, config: WorkflowConfig) -> Self {
        Self::assemble(
            services!(db),
            Arc::new(MemoryWorkflowStore::new()),
            config,
        )
    }

    /// Wires every service over PostgreSQL, with workflow histories in the
    /// same database.
    pub fn postgres(db: &PgDatabase, config: WorkflowConfig) -> Self {
        Self::assemble(
            services!(db),
            Arc::new(PgWorkflowStore::new(db.pool().clone())),
            config,
        )
    }

    fn assemble(
        services: Services,
        store: Arc<dyn WorkflowStore>,
        config: WorkflowConfig,
    ) -> Self {
        let workflows = LocalWorkflowService::new(
            store,
            TokioTimer,
            Arc::new(HardDeleteUser::new(services.users.clone())),
            config,
        );

        let consumers = HashMap::from([
            (
                "user",
                Consumer::new(
                    integration::source::USER,
                    user_handlers(Arc::new(workflows.clone())),
                ),
            ),
            (
                "order",
                Consumer::new(
                    integration::source::ORDER,
                    order_handlers(services.orders.clone()),
                ),
            ),
            (
                "notification",
                Consumer::new(
                    "notificationservice",
                    notification_handlers(services.notifications.clone()),
                ),
            ),
        ]);

        Self {
            users: services.users,
            accounts: services.accounts,
            products: services.products,
            orders: services.orders,
            notifications: services.notifications,
            workflows,
            consumers,
        }
    }

    /// Inbound consumer of a service, by short name.
    pub fn consumer(&self, service: &str) -> Option<&Consumer> {
        self.consumers.get(service)
    }

    /// Short names of the services accepting deliveries, sorted.
    pub fn consumer_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.consumers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

struct Services {
    users: Arc<dyn UserService>,
    accounts: Arc<dyn AccountService>,
    products: Arc<dyn ProductService>,
    orders: Arc<dyn OrderService>,
    notifications: Arc<dyn NotificationService>,
}
