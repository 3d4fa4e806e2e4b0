use common::ProductId;

use super::{
    Product, ProductCreated, ProductData, ProductDeleted, ProductRepository, ProductSpec,
    ProductUpdated,
};
use crate::event::{EventDispatcher, FieldChange};
use crate::{DomainError, Result};

/// Domain service for the product aggregate.
pub struct ProductDomainService<R, D> {
    repository: R,
    dispatcher: D,
}

impl<R: ProductRepository, D: EventDispatcher> ProductDomainService<R, D> {
    /// Creates a service over a transaction-scoped repository and dispatcher.
    pub fn new(repository: R, dispatcher: D) -> Self {
        Self {
            repository,
            dispatcher,
        }
    }

    /// Finds a product by id.
    pub async fn find_product(&self, id: ProductId) -> Result<Product> {
        self.repository.find(&ProductSpec::by_id(id)).await
    }

    /// Adds a product under a unique name.
    #[tracing::instrument(skip(self))]
    pub async fn create_product(&self, data: ProductData) -> Result<ProductId> {
        self.ensure_name_unused(&data.name, None).await?;

        let id = self.repository.next_id().await?;
        let now = common::time::now();
        let product = Product {
            id,
            name: data.name,
            description: data.description,
            price: data.price,
            created_at: now,
            updated_at: now,
        };
        self.repository.store(&product).await?;

        self.dispatcher
            .dispatch(&ProductCreated {
                product_id: id,
                name: product.name,
                description: product.description,
                price: product.price,
                created_at: now,
            })
            .await?;
        Ok(id)
    }

    /// Brings a product to the desired field values.
    ///
    /// Renaming to the product's own name takes the no-change path.
    #[tracing::instrument(skip(self))]
    pub async fn update_product(&self, id: ProductId, data: ProductData) -> Result<()> {
        let current = self.repository.find(&ProductSpec::by_id(id)).await?;

        if data.name != current.name {
            self.ensure_name_unused(&data.name, Some(id)).await?;
        }

        let now = common::time::now();
        let event = ProductUpdated {
            product_id: id,
            name: FieldChange::diff(&current.name, &data.name),
            description: FieldChange::diff_optional(&current.description, &data.description),
            price: FieldChange::diff(&current.price, &data.price),
            updated_at: now,
        };
        if !event.has_changes() {
            return Ok(());
        }

        let product = Product {
            name: data.name,
            description: data.description,
            price: data.price,
            updated_at: now,
            ..current
        };
        self.repository.store(&product).await?;

        self.dispatcher.dispatch(&event).await
    }

    /// Removes a product. Absent products are a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn delete_product(&self, id: ProductId) -> Result<()> {
        match self.repository.find(&ProductSpec::by_id(id)).await {
            Ok(_) => {}
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err),
        }

        self.repository.delete(id).await?;
        self.dispatcher
            .dispatch(&ProductDeleted {
                product_id: id,
                hard: true,
                deleted_at: common::time::now(),
            })
            .await
    }

    async fn ensure_name_unused(&self, name: &str, owner: Option<ProductId>) -> Result<()> {
        match self.repository.find(&ProductSpec::by_name(name)).await {
            Ok(existing) if Some(existing.id) != owner => {
                metrics::counter!("domain_conflicts_total", "entity" => "product", "field" => "name")
                    .increment(1);
                Err(DomainError::already_used("product", "name"))
            }
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordingDispatcher;
    use crate::product::MemoryProductRepository;
    use store::{MemoryTable, MemoryTransaction};

    fn service() -> (
        ProductDomainService<MemoryProductRepository, RecordingDispatcher>,
        RecordingDispatcher,
    ) {
        let table = MemoryTable::new();
        let tx = MemoryTransaction::new();
        let dispatcher = RecordingDispatcher::new();
        let service = ProductDomainService::new(
            MemoryProductRepository::new(table.stage(&tx)),
            dispatcher.clone(),
        );
        (service, dispatcher)
    }

    fn data(name: &str, price: i64) -> ProductData {
        ProductData {
            name: name.to_string(),
            description: None,
            price,
        }
    }

    #[tokio::test]
    async fn rename_to_other_products_name_is_rejected() {
        let (service, dispatcher) = service();
        service.create_product(data("lamp", 100)).await.unwrap();
        let chair = service.create_product(data("chair", 200)).await.unwrap();

        let err = service
            .update_product(chair, data("lamp", 200))
            .await
            .unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(service.find_product(chair).await.unwrap().name, "chair");
        assert_eq!(dispatcher.len().await, 2);
    }

    #[tokio::test]
    async fn rename_to_own_name_is_a_no_op() {
        let (service, dispatcher) = service();
        let lamp = service.create_product(data("lamp", 100)).await.unwrap();

        service.update_product(lamp, data("lamp", 100)).await.unwrap();

        assert_eq!(dispatcher.event_types().await, vec!["product_created"]);
    }

    #[tokio::test]
    async fn update_reports_changed_and_removed_fields() {
        let (service, dispatcher) = service();
        let lamp = service
            .create_product(ProductData {
                description: Some("bright".to_string()),
                ..data("lamp", 100)
            })
            .await
            .unwrap();

        service.update_product(lamp, data("lamp", 150)).await.unwrap();

        let updates = dispatcher.events_of::<ProductUpdated>().await;
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].name, FieldChange::Unchanged);
        assert_eq!(updates[0].price, FieldChange::Set(150));
        assert_eq!(updates[0].description, FieldChange::Removed);
    }

    #[tokio::test]
    async fn delete_is_hard_and_idempotent() {
        let (service, dispatcher) = service();
        let lamp = service.create_product(data("lamp", 100)).await.unwrap();

        service.delete_product(lamp).await.unwrap();
        service.delete_product(lamp).await.unwrap();

        let deleted = dispatcher.events_of::<ProductDeleted>().await;
        assert_eq!(deleted.len(), 1);
        assert!(deleted[0].hard);

        // The name is free again once the product is gone.
        service.create_product(data("lamp", 90)).await.unwrap();
    }
}
