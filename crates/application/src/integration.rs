//! Integration event wire formats.
//!
//! Payloads are snake_case JSON with hyphenated UUID strings and Unix-second
//! timestamps. Statuses travel as their numeric codes. Producers register
//! these conversions in a [`SerializerRegistry`]; consumers deserialize the
//! same structs.

use common::time::to_unix;
use common::{OrderId, ProductId, UserId};
use domain::FieldChange;
use domain::account::{AccountBalanceUpdated, AccountCreated, AccountDeleted};
use domain::order::{OrderCreated, OrderItem, OrderUpdated};
use domain::product::{ProductCreated, ProductDeleted, ProductUpdated};
use domain::user::{UserCreated, UserDeleted, UserUpdated};
use serde::{Deserialize, Serialize};
use store::SerializerRegistry;

/// Source names stamped on outbox records.
pub mod source {
    pub const USER: &str = "userservice";
    pub const PAYMENT: &str = "paymentservice";
    pub const PRODUCT: &str = "productservice";
    pub const ORDER: &str = "orderservice";
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCreatedPayload {
    pub user_id: UserId,
    pub login: String,
    pub status: i16,
    pub created_at: i64,
}

impl From<&UserCreated> for UserCreatedPayload {
    fn from(event: &UserCreated) -> Self {
        Self {
            user_id: event.user_id,
            login: event.login.clone(),
            status: event.status.code(),
            created_at: to_unix(event.created_at),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdatedFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRemovedFields {
    #[serde(default, skip_serializing_if = "is_false")]
    pub email: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub telegram: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdatedPayload {
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_fields: Option<UserUpdatedFields>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_fields: Option<UserRemovedFields>,
    pub updated_at: i64,
}

impl From<&UserUpdated> for UserUpdatedPayload {
    fn from(event: &UserUpdated) -> Self {
        let updated = UserUpdatedFields {
            login: event.login.value().cloned(),
            status: event.status.value().map(|status| status.code()),
            email: event.email.value().cloned(),
            telegram: event.telegram.value().cloned(),
        };
        let removed = UserRemovedFields {
            email: event.email.is_removed(),
            telegram: event.telegram.is_removed(),
        };
        Self {
            user_id: event.user_id,
            updated_fields: (updated != UserUpdatedFields::default()).then_some(updated),
            removed_fields: (removed != UserRemovedFields::default()).then_some(removed),
            updated_at: to_unix(event.updated_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDeletedPayload {
    pub user_id: UserId,
    pub hard: bool,
    pub deleted_at: i64,
}

impl From<&UserDeleted> for UserDeletedPayload {
    fn from(event: &UserDeleted) -> Self {
        Self {
            user_id: event.user_id,
            hard: event.hard,
            deleted_at: to_unix(event.deleted_at),
        }
    }
}

/// Serializers for events raised by the user service.
pub fn user_serializers() -> SerializerRegistry {
    SerializerRegistry::new()
        .register(UserCreated::EVENT_TYPE, |e: &UserCreated| {
            UserCreatedPayload::from(e)
        })
        .register(UserUpdated::EVENT_TYPE, |e: &UserUpdated| {
            UserUpdatedPayload::from(e)
        })
        .register(UserDeleted::EVENT_TYPE, |e: &UserDeleted| {
            UserDeletedPayload::from(e)
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCreatedPayload {
    pub user_id: UserId,
    pub balance: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalanceUpdatedPayload {
    pub user_id: UserId,
    pub balance: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDeletedPayload {
    pub user_id: UserId,
    pub hard: bool,
    pub deleted_at: i64,
}

/// Serializers for events raised by the payment (account) service.
pub fn account_serializers() -> SerializerRegistry {
    SerializerRegistry::new()
        .register(AccountCreated::EVENT_TYPE, |e: &AccountCreated| {
            AccountCreatedPayload {
                user_id: e.user_id,
                balance: e.balance,
                created_at: to_unix(e.created_at),
            }
        })
        .register(
            AccountBalanceUpdated::EVENT_TYPE,
            |e: &AccountBalanceUpdated| AccountBalanceUpdatedPayload {
                user_id: e.user_id,
                balance: e.balance,
                updated_at: to_unix(e.updated_at),
            },
        )
        .register(AccountDeleted::EVENT_TYPE, |e: &AccountDeleted| {
            AccountDeletedPayload {
                user_id: e.user_id,
                hard: e.hard,
                deleted_at: to_unix(e.deleted_at),
            }
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreatedPayload {
    pub product_id: ProductId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdatedFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRemovedFields {
    #[serde(default, skip_serializing_if = "is_false")]
    pub description: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdatedPayload {
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_fields: Option<ProductUpdatedFields>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_fields: Option<ProductRemovedFields>,
    pub updated_at: i64,
}

impl From<&ProductUpdated> for ProductUpdatedPayload {
    fn from(event: &ProductUpdated) -> Self {
        let updated = ProductUpdatedFields {
            name: event.name.value().cloned(),
            description: event.description.value().cloned(),
            price: event.price.value().copied(),
        };
        let removed = ProductRemovedFields {
            description: matches!(event.description, FieldChange::Removed),
        };
        Self {
            product_id: event.product_id,
            updated_fields: (updated != ProductUpdatedFields::default()).then_some(updated),
            removed_fields: removed.description.then_some(removed),
            updated_at: to_unix(event.updated_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDeletedPayload {
    pub product_id: ProductId,
    pub hard: bool,
    pub deleted_at: i64,
}

/// Serializers for events raised by the product service.
pub fn product_serializers() -> SerializerRegistry {
    SerializerRegistry::new()
        .register(ProductCreated::EVENT_TYPE, |e: &ProductCreated| {
            ProductCreatedPayload {
                product_id: e.product_id,
                name: e.name.clone(),
                description: e.description.clone(),
                price: e.price,
                created_at: to_unix(e.created_at),
            }
        })
        .register(ProductUpdated::EVENT_TYPE, |e: &ProductUpdated| {
            ProductUpdatedPayload::from(e)
        })
        .register(ProductDeleted::EVENT_TYPE, |e: &ProductDeleted| {
            ProductDeletedPayload {
                product_id: e.product_id,
                hard: e.hard,
                deleted_at: to_unix(e.deleted_at),
            }
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedPayload {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub total_price: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdatedPayload {
    pub order_id: OrderId,
    pub status: i16,
    pub updated_at: i64,
}

/// Serializers for events raised by the order service.
pub fn order_serializers() -> SerializerRegistry {
    SerializerRegistry::new()
        .register(OrderCreated::EVENT_TYPE, |e: &OrderCreated| {
            OrderCreatedPayload {
                order_id: e.order_id,
                user_id: e.user_id,
                items: e.items.clone(),
                total_price: e.total_price,
                created_at: to_unix(e.created_at),
            }
        })
        .register(OrderUpdated::EVENT_TYPE, |e: &OrderUpdated| {
            OrderUpdatedPayload {
                order_id: e.order_id,
                status: e.status.code(),
                updated_at: to_unix(e.updated_at),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use domain::user::UserStatus;
    use serde_json::{Value, json};

    fn at() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 30).unwrap()
    }

    fn user_id() -> UserId {
        "0190f5a8-3c7e-7a4b-9d2e-1f0a2b3c4d5e".parse().unwrap()
    }

    fn encode(registry: &SerializerRegistry, tag: &str, event: &dyn std::any::Any) -> Value {
        serde_json::from_str(&registry.serialize(tag, event).unwrap()).unwrap()
    }

    #[test]
    fn balance_updated_wire_shape() {
        let body = encode(
            &account_serializers(),
            "account_balance_updated",
            &AccountBalanceUpdated {
                user_id: user_id(),
                balance: -250,
                updated_at: at(),
            },
        );

        assert_eq!(
            body,
            json!({
                "user_id": "0190f5a8-3c7e-7a4b-9d2e-1f0a2b3c4d5e",
                "balance": -250,
                "updated_at": 1_714_564_830,
            })
        );
    }

    #[test]
    fn user_updated_carries_only_changes() {
        let body = encode(
            &user_serializers(),
            "user_updated",
            &UserUpdated {
                user_id: user_id(),
                login: FieldChange::Unchanged,
                status: FieldChange::Set(UserStatus::Deleted),
                email: FieldChange::Removed,
                telegram: FieldChange::Unchanged,
                updated_at: at(),
            },
        );

        assert_eq!(
            body,
            json!({
                "user_id": "0190f5a8-3c7e-7a4b-9d2e-1f0a2b3c4d5e",
                "updated_fields": { "status": 1 },
                "removed_fields": { "email": true },
                "updated_at": 1_714_564_830,
            })
        );
    }

    #[test]
    fn user_deleted_is_readable_by_consumers() {
        let body = user_serializers()
            .serialize(
                "user_deleted",
                &UserDeleted {
                    user_id: user_id(),
                    hard: false,
                    deleted_at: at(),
                },
            )
            .unwrap();

        let payload: UserDeletedPayload = serde_json::from_str(&body).unwrap();
        assert_eq!(payload.user_id, user_id());
        assert!(!payload.hard);
    }

    #[test]
    fn product_update_without_removals_omits_removed_fields() {
        let payload = ProductUpdatedPayload::from(&ProductUpdated {
            product_id: ProductId::new(),
            name: FieldChange::Unchanged,
            description: FieldChange::Unchanged,
            price: FieldChange::Set(990),
            updated_at: at(),
        });

        assert_eq!(payload.removed_fields, None);
        assert_eq!(payload.updated_fields.unwrap().price, Some(990));
    }

    #[test]
    fn each_service_registers_its_own_events() {
        assert_eq!(
            user_serializers().event_types(),
            vec!["user_created", "user_deleted", "user_updated"]
        );
        assert_eq!(
            order_serializers().event_types(),
            vec!["order_created", "order_updated"]
        );
        assert!(!order_serializers().contains("user_created"));
    }
}
