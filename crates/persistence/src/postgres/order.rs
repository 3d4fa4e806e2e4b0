use async_trait::async_trait;
use common::{OrderId, ProductId, UserId};
use domain::order::{
    LocalProduct, LocalProductRepository, LocalUser, LocalUserRepository, Order, OrderItem,
    OrderRepository, OrderSpec, OrderStatus,
};
use domain::{DomainError, Result};
use sqlx::postgres::PgRow;
use sqlx::{Postgres, QueryBuilder, Row};
use store::PgTransaction;
use uuid::Uuid;

use super::{db_error, decode_error, timed};

#[derive(Clone)]
pub struct PgOrderRepository {
    tx: PgTransaction,
}

impl PgOrderRepository {
    pub fn new(tx: PgTransaction) -> Self {
        Self { tx }
    }

    fn row_to_item(row: PgRow) -> std::result::Result<OrderItem, sqlx::Error> {
        Ok(OrderItem {
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            quantity: row.try_get("quantity")?,
            price: row.try_get("price")?,
        })
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn next_id(&self) -> Result<OrderId> {
        Ok(OrderId::new())
    }

    async fn store(&self, order: &Order) -> Result<()> {
        let mut conn = self.tx.connection().await?;
        let query = sqlx::query(
            r#"
            INSERT INTO orders (order_id, user_id, total_price, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (order_id) DO UPDATE SET
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.total_price)
        .bind(order.status.code())
        .bind(order.created_at)
        .bind(order.updated_at);
        timed("upsert", "orders", query.execute(&mut *conn))
            .await
            .map_err(db_error)?;

        // Items never change once written.
        if order.items.is_empty() {
            return Ok(());
        }
        let mut items = QueryBuilder::<Postgres>::new(
            "INSERT INTO order_items (order_id, product_id, quantity, price) ",
        );
        items.push_values(&order.items, |mut row, item| {
            row.push_bind(order.id.as_uuid())
                .push_bind(item.product_id.as_uuid())
                .push_bind(item.quantity)
                .push_bind(item.price);
        });
        items.push(" ON CONFLICT (order_id, product_id) DO NOTHING");
        timed("insert", "order_items", items.build().execute(&mut *conn))
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn find(&self, spec: &OrderSpec) -> Result<Order> {
        if spec.is_empty() {
            return Err(DomainError::not_found("order"));
        }

        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT order_id, user_id, total_price, status, created_at, updated_at \
             FROM orders WHERE TRUE",
        );
        if let Some(id) = spec.id {
            query.push(" AND order_id = ").push_bind(id.as_uuid());
        }
        if let Some(user_id) = spec.user_id {
            query.push(" AND user_id = ").push_bind(user_id.as_uuid());
        }
        query.push(" LIMIT 1");

        let mut conn = self.tx.connection().await?;
        let Some(row) = timed("select", "orders", query.build().fetch_optional(&mut *conn))
            .await
            .map_err(db_error)?
        else {
            return Err(DomainError::not_found("order"));
        };

        let id: Uuid = row.try_get("order_id").map_err(db_error)?;
        let code: i16 = row.try_get("status").map_err(db_error)?;
        let status = OrderStatus::from_code(code)
            .ok_or_else(|| decode_error(format!("invalid order status {code}")))?;

        let item_rows = timed(
            "select",
            "order_items",
            sqlx::query(
                "SELECT product_id, quantity, price FROM order_items \
                 WHERE order_id = $1 ORDER BY product_id",
            )
            .bind(id)
            .fetch_all(&mut *conn),
        )
        .await
        .map_err(db_error)?;
        let items = item_rows
            .into_iter()
            .map(Self::row_to_item)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_error)?;

        Ok(Order {
            id: OrderId::from_uuid(id),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id").map_err(db_error)?),
            items,
            total_price: row.try_get("total_price").map_err(db_error)?,
            status,
            created_at: row.try_get("created_at").map_err(db_error)?,
            updated_at: row.try_get("updated_at").map_err(db_error)?,
        })
    }
}

#[derive(Clone)]
pub struct PgLocalUserRepository {
    tx: PgTransaction,
}

impl PgLocalUserRepository {
    pub fn new(tx: PgTransaction) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl LocalUserRepository for PgLocalUserRepository {
    async fn store(&self, user: &LocalUser) -> Result<()> {
        let mut conn = self.tx.connection().await?;
        let query = sqlx::query("INSERT INTO local_users (user_id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(user.user_id.as_uuid());
        timed("insert", "local_users", query.execute(&mut *conn))
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn find(&self, user_id: UserId) -> Result<LocalUser> {
        let mut conn = self.tx.connection().await?;
        let query =
            sqlx::query("SELECT user_id FROM local_users WHERE user_id = $1 AND NOT deleted")
                .bind(user_id.as_uuid());
        timed("select", "local_users", query.fetch_optional(&mut *conn))
            .await
            .map_err(db_error)?
            .map(|_| LocalUser { user_id })
            .ok_or_else(|| DomainError::not_found("user"))
    }

    async fn delete(&self, user_id: UserId) -> Result<()> {
        let mut conn = self.tx.connection().await?;
        let query = sqlx::query(
            r#"
            INSERT INTO local_users (user_id, deleted) VALUES ($1, TRUE)
            ON CONFLICT (user_id) DO UPDATE SET deleted = TRUE
            "#,
        )
        .bind(user_id.as_uuid());
        timed("tombstone", "local_users", query.execute(&mut *conn))
            .await
            .map_err(db_error)?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgLocalProductRepository {
    tx: PgTransaction,
}

impl PgLocalProductRepository {
    pub fn new(tx: PgTransaction) -> Self {
        Self { tx }
    }

    fn row_to_product(row: PgRow) -> std::result::Result<LocalProduct, sqlx::Error> {
        Ok(LocalProduct {
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            name: row.try_get("name")?,
            price: row.try_get("price")?,
        })
    }
}

#[async_trait]
impl LocalProductRepository for PgLocalProductRepository {
    async fn store(&self, product: &LocalProduct) -> Result<()> {
        let mut conn = self.tx.connection().await?;
        let query = sqlx::query(
            r#"
            INSERT INTO local_products (product_id, name, price)
            VALUES ($1, $2, $3)
            ON CONFLICT (product_id) DO UPDATE SET
                name = EXCLUDED.name,
                price = EXCLUDED.price
            WHERE NOT local_products.deleted
            "#,
        )
        .bind(product.product_id.as_uuid())
        .bind(&product.name)
        .bind(product.price);
        timed("upsert", "local_products", query.execute(&mut *conn))
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn find(&self, product_id: ProductId) -> Result<LocalProduct> {
        let mut conn = self.tx.connection().await?;
        let query = sqlx::query(
            "SELECT product_id, name, price FROM local_products WHERE product_id = $1 AND NOT deleted",
        )
        .bind(product_id.as_uuid());
        let row = timed("select", "local_products", query.fetch_optional(&mut *conn))
            .await
            .map_err(db_error)?;

        row.map(Self::row_to_product)
            .transpose()
            .map_err(db_error)?
            .ok_or_else(|| DomainError::not_found("product"))
    }

    async fn find_many(&self, product_ids: &[ProductId]) -> Result<Vec<LocalProduct>> {
        let ids: Vec<Uuid> = product_ids.iter().map(ProductId::as_uuid).collect();
        let mut conn = self.tx.connection().await?;
        let query = sqlx::query(
            r#"
            SELECT product_id, name, price FROM local_products
            WHERE product_id = ANY($1) AND NOT deleted
            "#,
        )
        .bind(ids);
        let rows = timed("select", "local_products", query.fetch_all(&mut *conn))
            .await
            .map_err(db_error)?;

        rows.into_iter()
            .map(Self::row_to_product)
            .collect::<std::result::Result<_, _>>()
            .map_err(db_error)
    }

    async fn delete(&self, product_id: ProductId) -> Result<()> {
        let mut conn = self.tx.connection().await?;
        let query = sqlx::query(
            r#"
            INSERT INTO local_products (product_id, name, price, deleted)
            VALUES ($1, '', 0, TRUE)
            ON CONFLICT (product_id) DO UPDATE SET deleted = TRUE
            "#,
        )
        .bind(product_id.as_uuid());
        timed("tombstone", "local_products", query.execute(&mut *conn))
            .await
            .map_err(db_error)?;
        Ok(())
    }
}
