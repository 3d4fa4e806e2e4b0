//! Order placement and status changes.

use std::collections::{HashMap, HashSet};

use common::{OrderId, UserId};

use super::{
    LocalProductRepository, LocalUserRepository, NewOrderItem, Order, OrderCreated, OrderError,
    OrderItem, OrderRepository, OrderSpec, OrderStatus, OrderUpdated,
};
use crate::event::EventDispatcher;
use crate::Result;

/// Domain service for the order aggregate.
///
/// Referential checks go through the local replicas; there is no
/// cross-service transaction.
pub struct OrderDomainService<R, U, P, D> {
    orders: R,
    users: U,
    products: P,
    dispatcher: D,
}

impl<R, U, P, D> OrderDomainService<R, U, P, D>
where
    R: OrderRepository,
    U: LocalUserRepository,
    P: LocalProductRepository,
    D: EventDispatcher,
{
    pub fn new(orders: R, users: U, products: P, dispatcher: D) -> Self {
        Self {
            orders,
            users,
            products,
            dispatcher,
        }
    }

    /// Finds an order.
    pub async fn find_order(&self, spec: &OrderSpec) -> Result<Order> {
        self.orders.find(spec).await
    }

    /// Places an order, pricing each line from the product replica.
    #[tracing::instrument(skip(self, items), fields(item_count = items.len()))]
    pub async fn create_order(&self, user_id: UserId, items: &[NewOrderItem]) -> Result<OrderId> {
        validate_items(items)?;

        match self.users.find(user_id).await {
            Ok(_) => {}
            Err(err) if err.is_not_found() => return Err(OrderError::UnknownUser(user_id).into()),
            Err(err) => return Err(err),
        }

        let product_ids: Vec<_> = items.iter().map(|item| item.product_id).collect();
        let prices: HashMap<_, _> = self
            .products
            .find_many(&product_ids)
            .await?
            .into_iter()
            .map(|product| (product.product_id, product.price))
            .collect();

        let mut priced = Vec::with_capacity(items.len());
        let mut total_price: i64 = 0;
        for item in items {
            let price = *prices
                .get(&item.product_id)
                .ok_or(OrderError::UnknownProduct(item.product_id))?;
            let line = OrderItem {
                product_id: item.product_id,
                quantity: item.quantity,
                price,
            };
            total_price = line
                .line_total()
                .and_then(|amount| total_price.checked_add(amount))
                .ok_or(OrderError::TotalOverflow)?;
            priced.push(line);
        }

        let id = self.orders.next_id().await?;
        let now = common::time::now();
        let order = Order {
            id,
            user_id,
            items: priced,
            total_price,
            status: OrderStatus::Open,
            created_at: now,
            updated_at: now,
        };
        self.orders.store(&order).await?;

        self.dispatcher
            .dispatch(&OrderCreated {
                order_id: id,
                user_id,
                items: order.items,
                total_price,
                created_at: now,
            })
            .await?;

        tracing::info!(%id, total_price, "order created");
        Ok(id)
    }

    /// Moves an order to `status`. Setting the current status is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<()> {
        let mut order = self.orders.find(&OrderSpec::by_id(id)).await?;
        if order.status == status {
            return Ok(());
        }
        if !order.status.can_transition_to(status) {
            return Err(OrderError::InvalidStatusTransition {
                from: order.status,
                to: status,
            }
            .into());
        }

        let now = common::time::now();
        order.status = status;
        order.updated_at = now;
        self.orders.store(&order).await?;

        self.dispatcher
            .dispatch(&OrderUpdated {
                order_id: id,
                status,
                updated_at: now,
            })
            .await?;
        Ok(())
    }
}

fn validate_items(items: &[NewOrderItem]) -> std::result::Result<(), OrderError> {
    if items.is_empty() {
        return Err(OrderError::NoItems);
    }
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if item.quantity <= 0 {
            return Err(OrderError::InvalidQuantity {
                product_id: item.product_id,
                quantity: item.quantity,
            });
        }
        if !seen.insert(item.product_id) {
            return Err(OrderError::DuplicateProduct(item.product_id));
        }
    }
    Ok(())
}
