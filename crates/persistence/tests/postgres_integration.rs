//! PostgreSQL integration tests for the service repositories.
//!
//! These tests share one PostgreSQL container. Run with:
//!
//! ```bash
//! cargo test -p persistence --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;
use std::time::Duration;

use application::integration;
use application::{
    AccountAppService, AccountService, NotificationAppService, NotificationService,
    OrderAppService, OrderService, ProductAppService, ProductService, UserAppService, UserInput,
    UserService,
};
use common::{OrderId, ProductId, UserId};
use domain::order::{NewOrderItem, OrderStatus};
use domain::product::ProductData;
use domain::user::UserStatus;
use persistence::PgDatabase;
use serial_test::serial;
use sqlx::postgres::PgPoolOptions;
use store::OutboxReader;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();
            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();
            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let db = PgDatabase::connect(&connection_string, 2).await.unwrap();
            db.run_migrations().await.unwrap();
            db.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_db() -> PgDatabase {
    let info = get_container_info().await;
    let db = PgDatabase::connect(&info.connection_string, 20)
        .await
        .unwrap();
    sqlx::query(
        "TRUNCATE outbox, users, accounts, products, orders, order_items, \
         local_users, local_products, notifications",
    )
    .execute(db.pool())
    .await
    .unwrap();
    db
}

fn user_input(login: &str, email: Option<&str>) -> UserInput {
    UserInput {
        id: None,
        login: login.to_string(),
        email: email.map(str::to_string),
        telegram: None,
        status: UserStatus::Active,
    }
}

#[tokio::test]
#[serial]
async fn user_round_trip_with_outbox() {
    let db = get_test_db().await;
    let users = UserAppService::new(
        db.user_unit_of_work(),
        Arc::new(integration::user_serializers()),
    );

    let id = users
        .store_user(user_input("alice", Some("alice@example.com")))
        .await
        .unwrap();
    let user = users.find_user(id).await.unwrap();
    assert_eq!(user.login, "alice");
    assert_eq!(user.email.as_deref(), Some("alice@example.com"));

    let pending = db.outbox_reader().pending(10).await.unwrap();
    let types: Vec<_> = pending.iter().map(|r| r.event_type.as_str()).collect();
    assert_eq!(types, vec!["user_created", "user_updated"]);
    assert!(pending.iter().all(|r| r.source == "userservice"));
}

#[tokio::test]
#[serial]
async fn unique_indexes_surface_as_conflicts() {
    let db = get_test_db().await;
    let users = UserAppService::new(
        db.user_unit_of_work(),
        Arc::new(integration::user_serializers()),
    );

    users
        .store_user(user_input("alice", Some("shared@example.com")))
        .await
        .unwrap();

    let login = users.store_user(user_input("alice", None)).await.unwrap_err();
    assert!(login.is_conflict());

    let email = users
        .store_user(user_input("bob", Some("shared@example.com")))
        .await
        .unwrap_err();
    assert!(email.is_conflict());

    // The failed create of bob rolled back along with its outbox rows.
    let pending = db.outbox_reader().pending(10).await.unwrap();
    assert_eq!(pending.len(), 2);
}

#[tokio::test]
#[serial]
async fn hard_delete_removes_user() {
    let db = get_test_db().await;
    let users = UserAppService::new(
        db.user_unit_of_work(),
        Arc::new(integration::user_serializers()),
    );
    let id = users.store_user(user_input("alice", None)).await.unwrap();

    users.delete_user(id, false).await.unwrap();
    assert_eq!(
        users.find_user(id).await.unwrap().status,
        UserStatus::Deleted
    );

    users.delete_user(id, true).await.unwrap();
    assert!(users.find_user(id).await.unwrap_err().is_not_found());
}

#[tokio::test]
#[serial]
async fn concurrent_balance_writes_keep_one_row() {
    let db = get_test_db().await;
    let accounts: Arc<dyn AccountService> = Arc::new(AccountAppService::new(
        db.account_unit_of_work(),
        Arc::new(integration::account_serializers()),
    ));
    let user_id = UserId::new();

    let mut tasks = Vec::new();
    for balance in 1..=5 {
        let accounts = accounts.clone();
        tasks.push(tokio::spawn(async move {
            accounts.store_balance(user_id, balance * 100).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
    let created: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM outbox WHERE event_type = 'account_created'")
            .fetch_one(db.pool())
            .await
            .unwrap();
    assert_eq!(created, 1);
}

/// A database whose pools hold only `size` connections each and give up
/// waiting for one after three seconds.
async fn small_db(size: u32) -> PgDatabase {
    let info = get_container_info().await;
    let pool = || {
        PgPoolOptions::new()
            .max_connections(size)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&info.connection_string)
    };
    PgDatabase::new(pool().await.unwrap(), pool().await.unwrap())
}

#[tokio::test]
#[serial]
async fn contended_balance_writes_fit_in_a_small_pool() {
    let db = get_test_db().await;
    let small = small_db(2).await;
    let accounts: Arc<dyn AccountService> = Arc::new(AccountAppService::new(
        small.account_unit_of_work(),
        Arc::new(integration::account_serializers()),
    ));
    let same_user = UserId::new();

    let mut tasks = Vec::new();
    for n in 1..=8 {
        let accounts = accounts.clone();
        let user_id = if n % 2 == 0 { same_user } else { UserId::new() };
        tasks.push(tokio::spawn(async move {
            accounts.store_balance(user_id, n * 100).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count, 5);
    small.close().await;
}

#[tokio::test]
#[serial]
async fn product_rename_conflict() {
    let db = get_test_db().await;
    let products = ProductAppService::new(
        db.product_unit_of_work(),
        Arc::new(integration::product_serializers()),
    );
    let data = |name: &str| ProductData {
        name: name.to_string(),
        description: Some("a thing".to_string()),
        price: 250,
    };

    products.create_product(data("book")).await.unwrap();
    let pen = products.create_product(data("pen")).await.unwrap();
    let err = products.update_product(pen, data("book")).await.unwrap_err();
    assert!(err.is_conflict());

    products.delete_product(pen).await.unwrap();
    assert!(products.find_product(pen).await.unwrap_err().is_not_found());
}

#[tokio::test]
#[serial]
async fn order_lifecycle() {
    let db = get_test_db().await;
    let orders = OrderAppService::new(
        db.order_unit_of_work(),
        Arc::new(integration::order_serializers()),
    );
    let user_id = UserId::new();
    let (book, pen) = (ProductId::new(), ProductId::new());
    orders.store_local_user(user_id).await.unwrap();
    orders
        .store_local_product(book, "book".to_string(), 1500)
        .await
        .unwrap();
    orders
        .store_local_product(pen, "pen".to_string(), 200)
        .await
        .unwrap();

    let id = orders
        .create_order(
            user_id,
            vec![
                NewOrderItem {
                    product_id: book,
                    quantity: 1,
                },
                NewOrderItem {
                    product_id: pen,
                    quantity: 3,
                },
            ],
        )
        .await
        .unwrap();
    orders
        .update_order_status(id, OrderStatus::Paid)
        .await
        .unwrap();

    let order = orders.find_order(id).await.unwrap();
    assert_eq!(order.total_price, 2100);
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.status, OrderStatus::Paid);
    assert!(orders.find_order(OrderId::new()).await.unwrap_err().is_not_found());
}

#[tokio::test]
#[serial]
async fn deleted_replicas_stay_deleted() {
    let db = get_test_db().await;
    let orders = OrderAppService::new(
        db.order_unit_of_work(),
        Arc::new(integration::order_serializers()),
    );
    let (user_id, book) = (UserId::new(), ProductId::new());

    orders.store_local_user(user_id).await.unwrap();
    orders
        .store_local_product(book, "book".to_string(), 1500)
        .await
        .unwrap();
    orders.delete_local_user(user_id).await.unwrap();
    orders.delete_local_product(book).await.unwrap();
    orders.store_local_user(user_id).await.unwrap();
    orders
        .store_local_product(book, "book".to_string(), 1500)
        .await
        .unwrap();

    let items = vec![NewOrderItem {
        product_id: book,
        quantity: 1,
    }];
    assert!(orders.create_order(user_id, items).await.is_err());

    // A delete that arrives before its create still wins.
    let pen = ProductId::new();
    orders.delete_local_product(pen).await.unwrap();
    orders
        .store_local_product(pen, "pen".to_string(), 200)
        .await
        .unwrap();
    let live: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM local_products WHERE NOT deleted")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(live, 0);
}

#[tokio::test]
#[serial]
async fn notifications_are_deduplicated() {
    let db = get_test_db().await;
    let notifications = NotificationAppService::new(db.notification_unit_of_work());
    let (order_id, user_id) = (OrderId::new(), UserId::new());

    let first = notifications
        .create_notification(order_id, user_id, "Order created".to_string())
        .await
        .unwrap();
    let second = notifications
        .create_notification(order_id, user_id, "Order created".to_string())
        .await
        .unwrap();

    assert_eq!(first, second);
    let listed = notifications.list_for_user(user_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].message, "Order created");
}
