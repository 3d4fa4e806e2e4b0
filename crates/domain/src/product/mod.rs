//! Product aggregate.

mod service;

pub use service::ProductDomainService;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::ProductId;
use store::StagedTable;

use crate::event::FieldChange;
use crate::{DomainError, Result};

/// A catalogue product. The name is unique across live products.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    /// Price in minor currency units.
    pub price: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the caller-editable fields.
    pub fn data(&self) -> ProductData {
        ProductData {
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
        }
    }
}

/// Desired state of the caller-editable product fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductData {
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
}

/// Sparse filter over products. An empty specification matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductSpec {
    pub id: Option<ProductId>,
    pub name: Option<String>,
}

impl ProductSpec {
    /// Matches the product with `id`.
    pub fn by_id(id: ProductId) -> Self {
        Self {
            id: Some(id),
            name: None,
        }
    }

    /// Matches the product named `name`.
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
        }
    }

    /// Returns true if no field is populated.
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.name.is_none()
    }

    /// Returns true if `product` satisfies every populated field.
    pub fn matches(&self, product: &Product) -> bool {
        !self.is_empty()
            && self.id.is_none_or(|id| id == product.id)
            && self.name.as_ref().is_none_or(|name| *name == product.name)
    }
}

/// Storage of products.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Allocates a new product id.
    async fn next_id(&self) -> Result<ProductId>;

    /// Inserts or replaces a product.
    async fn store(&self, product: &Product) -> Result<()>;

    /// Returns the first product matching `spec`, or `NotFound`.
    async fn find(&self, spec: &ProductSpec) -> Result<Product>;

    /// Physically removes a product. Removing an absent product is not an error.
    async fn delete(&self, id: ProductId) -> Result<()>;
}

/// A product was added to the catalogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductCreated {
    pub product_id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub created_at: DateTime<Utc>,
}

domain_event!(ProductCreated, "product_created");

/// Some product fields changed. Only changed fields are populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductUpdated {
    pub product_id: ProductId,
    pub name: FieldChange<String>,
    pub description: FieldChange<String>,
    pub price: FieldChange<i64>,
    pub updated_at: DateTime<Utc>,
}

domain_event!(ProductUpdated, "product_updated");

impl ProductUpdated {
    /// Returns true if at least one field changed.
    pub fn has_changes(&self) -> bool {
        self.name.is_changed() || self.description.is_changed() || self.price.is_changed()
    }
}

/// A product was removed. Product deletes are always hard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDeleted {
    pub product_id: ProductId,
    pub hard: bool,
    pub deleted_at: DateTime<Utc>,
}

domain_event!(ProductDeleted, "product_deleted");

/// [`ProductRepository`] over a staged in-memory table.
#[derive(Clone)]
pub struct MemoryProductRepository {
    products: StagedTable<ProductId, Product>,
}

impl MemoryProductRepository {
    /// Creates a repository over the transaction's view of the products table.
    pub fn new(products: StagedTable<ProductId, Product>) -> Self {
        Self { products }
    }
}

#[async_trait]
impl ProductRepository for MemoryProductRepository {
    async fn next_id(&self) -> Result<ProductId> {
        Ok(ProductId::new())
    }

    async fn store(&self, product: &Product) -> Result<()> {
        self.products.put(product.id, product.clone()).await;
        Ok(())
    }

    async fn find(&self, spec: &ProductSpec) -> Result<Product> {
        self.products
            .find(|product| spec.matches(product))
            .await
            .ok_or_else(|| DomainError::not_found("product"))
    }

    async fn delete(&self, id: ProductId) -> Result<()> {
        self.products.remove(&id).await;
        Ok(())
    }
}
