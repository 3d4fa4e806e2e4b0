//! Application services over the in-memory database.

use std::sync::Arc;

use application::integration::{
    self, AccountBalanceUpdatedPayload, OrderCreatedPayload, UserDeletedPayload,
};
use application::{
    AccountAppService, AccountService, NotificationAppService, NotificationService,
    OrderAppService, OrderService, ProductAppService, ProductService, UserAppService, UserInput,
    UserService,
};
use common::{ProductId, UserId};
use domain::order::{NewOrderItem, OrderError, OrderStatus};
use domain::product::ProductData;
use domain::user::UserStatus;
use domain::DomainError;
use persistence::MemoryDatabase;

fn user_service(db: &MemoryDatabase) -> Arc<dyn UserService> {
    Arc::new(UserAppService::new(
        db.user_unit_of_work(),
        Arc::new(integration::user_serializers()),
    ))
}

fn account_service(db: &MemoryDatabase) -> Arc<dyn AccountService> {
    Arc::new(AccountAppService::new(
        db.account_unit_of_work(),
        Arc::new(integration::account_serializers()),
    ))
}

fn product_service(db: &MemoryDatabase) -> Arc<dyn ProductService> {
    Arc::new(ProductAppService::new(
        db.product_unit_of_work(),
        Arc::new(integration::product_serializers()),
    ))
}

fn order_service(db: &MemoryDatabase) -> Arc<dyn OrderService> {
    Arc::new(OrderAppService::new(
        db.order_unit_of_work(),
        Arc::new(integration::order_serializers()),
    ))
}

fn new_user(login: &str) -> UserInput {
    UserInput {
        id: None,
        login: login.to_string(),
        email: None,
        telegram: None,
        status: UserStatus::Active,
    }
}

#[tokio::test]
async fn second_user_with_same_login_is_rejected_without_event() {
    let db = MemoryDatabase::new();
    let users = user_service(&db);

    users.store_user(new_user("alice")).await.unwrap();
    let err = users.store_user(new_user("alice")).await.unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(db.users.len().await, 1);
    assert_eq!(db.outbox.records_of_type("user_created").await.len(), 1);
}

#[tokio::test]
async fn new_user_with_contacts_is_created_then_updated_atomically() {
    let db = MemoryDatabase::new();
    let users = user_service(&db);

    let id = users
        .store_user(UserInput {
            email: Some("alice@example.com".to_string()),
            ..new_user("alice")
        })
        .await
        .unwrap();

    let user = users.find_user(id).await.unwrap();
    assert_eq!(user.email.as_deref(), Some("alice@example.com"));
    let types: Vec<_> = db
        .outbox
        .records()
        .await
        .into_iter()
        .map(|record| record.event_type)
        .collect();
    assert_eq!(types, vec!["user_created", "user_updated"]);
}

#[tokio::test]
async fn failed_update_leaves_no_state_and_no_record() {
    let db = MemoryDatabase::new();
    let users = user_service(&db);
    users
        .store_user(UserInput {
            email: Some("shared@example.com".to_string()),
            ..new_user("alice")
        })
        .await
        .unwrap();
    let before = db.outbox.records().await.len();

    let err = users
        .store_user(UserInput {
            email: Some("shared@example.com".to_string()),
            ..new_user("bob")
        })
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(db.users.len().await, 1);
    assert_eq!(db.outbox.records().await.len(), before);
}

#[tokio::test]
async fn soft_delete_publishes_once() {
    let db = MemoryDatabase::new();
    let users = user_service(&db);
    let id = users.store_user(new_user("alice")).await.unwrap();

    users.delete_user(id, false).await.unwrap();
    users.delete_user(id, false).await.unwrap();

    let records = db.outbox.records_of_type("user_deleted").await;
    assert_eq!(records.len(), 1);
    let payload: UserDeletedPayload = serde_json::from_str(&records[0].payload).unwrap();
    assert_eq!(payload.user_id, id);
    assert!(!payload.hard);
    assert_eq!(
        users.find_user(id).await.unwrap().status,
        UserStatus::Deleted
    );
}

#[tokio::test]
async fn concurrent_balance_writes_are_serialized() {
    let db = MemoryDatabase::new();
    let accounts = account_service(&db);
    let user_id = UserId::new();

    let mut tasks = Vec::new();
    for balance in 1..=20 {
        let accounts = accounts.clone();
        tasks.push(tokio::spawn(async move {
            accounts.store_balance(user_id, balance).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(db.outbox.records_of_type("account_created").await.len(), 1);
    let updates = db.outbox.records_of_type("account_balance_updated").await;
    assert_eq!(updates.len(), 19);

    let last: AccountBalanceUpdatedPayload =
        serde_json::from_str(&updates[updates.len() - 1].payload).unwrap();
    let account = accounts.find_balance(user_id).await.unwrap();
    assert_eq!(account.balance, last.balance);
}

#[tokio::test]
async fn rename_onto_taken_name_is_rejected() {
    let db = MemoryDatabase::new();
    let products = product_service(&db);
    let data = |name: &str| ProductData {
        name: name.to_string(),
        description: None,
        price: 100,
    };
    products.create_product(data("book")).await.unwrap();
    let pen = products.create_product(data("pen")).await.unwrap();

    let err = products.update_product(pen, data("book")).await.unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(products.find_product(pen).await.unwrap().name, "pen");
    assert!(db.outbox.records_of_type("product_updated").await.is_empty());
}

#[tokio::test]
async fn order_is_priced_from_replicas_and_published() {
    let db = MemoryDatabase::new();
    let orders = order_service(&db);
    let user_id = UserId::new();
    let book = ProductId::new();
    orders.store_local_user(user_id).await.unwrap();
    orders
        .store_local_product(book, "book".to_string(), 1500)
        .await
        .unwrap();
    orders
        .update_local_product(book, None, Some(1200))
        .await
        .unwrap();

    let id = orders
        .create_order(
            user_id,
            vec![NewOrderItem {
                product_id: book,
                quantity: 2,
            }],
        )
        .await
        .unwrap();
    orders
        .update_order_status(id, OrderStatus::Paid)
        .await
        .unwrap();

    let order = orders.find_order(id).await.unwrap();
    assert_eq!(order.total_price, 2400);
    assert_eq!(order.status, OrderStatus::Paid);

    let created = db.outbox.records_of_type("order_created").await;
    let payload: OrderCreatedPayload = serde_json::from_str(&created[0].payload).unwrap();
    assert_eq!(payload.total_price, 2400);
    assert_eq!(payload.items[0].price, 1200);
    assert_eq!(db.outbox.records_of_type("order_updated").await.len(), 1);
}

#[tokio::test]
async fn order_for_removed_user_is_rejected() {
    let db = MemoryDatabase::new();
    let orders = order_service(&db);
    let user_id = UserId::new();
    let book = ProductId::new();
    orders.store_local_user(user_id).await.unwrap();
    orders
        .store_local_product(book, "book".to_string(), 1500)
        .await
        .unwrap();
    orders.delete_local_user(user_id).await.unwrap();

    let err = orders
        .create_order(
            user_id,
            vec![NewOrderItem {
                product_id: book,
                quantity: 1,
            }],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::Order(OrderError::UnknownUser(_))));
    assert!(db.orders.is_empty().await);
    assert!(db.outbox.records().await.is_empty());
}

#[tokio::test]
async fn duplicate_notification_returns_existing_id() {
    let db = MemoryDatabase::new();
    let notifications = NotificationAppService::new(db.notification_unit_of_work());
    let (order_id, user_id) = (common::OrderId::new(), UserId::new());

    let first = notifications
        .create_notification(order_id, user_id, "Order created".to_string())
        .await
        .unwrap();
    let second = notifications
        .create_notification(order_id, user_id, "Order created".to_string())
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(notifications.list_for_user(user_id).await.unwrap().len(), 1);
}
