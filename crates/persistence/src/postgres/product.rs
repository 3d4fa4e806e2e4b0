use async_trait::async_trait;
use common::ProductId;
use domain::product::{Product, ProductRepository, ProductSpec};
use domain::{DomainError, Result};
use sqlx::postgres::PgRow;
use sqlx::{Postgres, QueryBuilder, Row};
use store::PgTransaction;
use uuid::Uuid;

use super::{db_error, timed, unique_violation};

#[derive(Clone)]
pub struct PgProductRepository {
    tx: PgTransaction,
}

impl PgProductRepository {
    pub fn new(tx: PgTransaction) -> Self {
        Self { tx }
    }

    fn row_to_product(row: PgRow) -> std::result::Result<Product, sqlx::Error> {
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: row.try_get("price")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn next_id(&self) -> Result<ProductId> {
        Ok(ProductId::new())
    }

    async fn store(&self, product: &Product) -> Result<()> {
        let mut conn = self.tx.connection().await?;
        let query = sqlx::query(
            r#"
            INSERT INTO products (product_id, name, description, price, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (product_id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                price = EXCLUDED.price,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.created_at)
        .bind(product.updated_at);

        timed("upsert", "products", query.execute(&mut *conn))
            .await
            .map_err(|e| match unique_violation(&e) {
                Some("idx_products_name") => DomainError::already_used("product", "name"),
                _ => db_error(e),
            })?;
        Ok(())
    }

    async fn find(&self, spec: &ProductSpec) -> Result<Product> {
        if spec.is_empty() {
            return Err(DomainError::not_found("product"));
        }

        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT product_id, name, description, price, created_at, updated_at \
             FROM products WHERE TRUE",
        );
        if let Some(id) = spec.id {
            query.push(" AND product_id = ").push_bind(id.as_uuid());
        }
        if let Some(name) = &spec.name {
            query.push(" AND name = ").push_bind(name.clone());
        }
        query.push(" LIMIT 1");

        let mut conn = self.tx.connection().await?;
        let row = timed("select", "products", query.build().fetch_optional(&mut *conn))
            .await
            .map_err(db_error)?;

        row.map(Self::row_to_product)
            .transpose()
            .map_err(db_error)?
            .ok_or_else(|| DomainError::not_found("product"))
    }

    async fn delete(&self, id: ProductId) -> Result<()> {
        let mut conn = self.tx.connection().await?;
        let query = sqlx::query("DELETE FROM products WHERE product_id = $1").bind(id.as_uuid());
        timed("delete", "products", query.execute(&mut *conn))
            .await
            .map_err(db_error)?;
        Ok(())
    }
}
