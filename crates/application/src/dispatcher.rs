//! Domain event dispatch into the transactional outbox.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{DomainEvent, EventDispatcher};
use store::{OutboxRecord, OutboxWriter, SerializerRegistry};

/// [`EventDispatcher`] that appends serialized events to the outbox.
///
/// The writer belongs to the current transaction, so the record commits
/// together with the state change. An event type missing from the registry
/// fails the dispatch and with it the transaction.
pub struct OutboxEventDispatcher<W> {
    writer: W,
    registry: Arc<SerializerRegistry>,
    source: &'static str,
}

impl<W: OutboxWriter> OutboxEventDispatcher<W> {
    /// Creates a dispatcher publishing on behalf of `source`.
    pub fn new(writer: W, registry: Arc<SerializerRegistry>, source: &'static str) -> Self {
        Self {
            writer,
            registry,
            source,
        }
    }
}

#[async_trait]
impl<W: OutboxWriter> EventDispatcher for OutboxEventDispatcher<W> {
    async fn dispatch(&self, event: &dyn DomainEvent) -> domain::Result<()> {
        let event_type = event.event_type();
        let payload = self.registry.serialize(event_type, event.as_any())?;
        let record = OutboxRecord::builder()
            .source(self.source)
            .event_type(event_type)
            .payload(payload)
            .build()?;

        tracing::debug!(record_id = %record.id, event_type, source = self.source, "outbox record appended");
        self.writer.append(record).await?;

        metrics::counter!("outbox_records_total", "event_type" => event_type).increment(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration;
    use chrono::Utc;
    use common::UserId;
    use domain::DomainError;
    use domain::account::AccountBalanceUpdated;
    use domain::user::UserDeleted;
    use store::{MemoryOutbox, MemoryTransaction, StoreError};

    #[tokio::test]
    async fn dispatch_appends_serialized_record() {
        let outbox = MemoryOutbox::new();
        let tx = MemoryTransaction::new();
        let dispatcher = OutboxEventDispatcher::new(
            outbox.writer(&tx),
            Arc::new(integration::account_serializers()),
            "paymentservice",
        );
        let user_id = UserId::new();

        dispatcher
            .dispatch(&AccountBalanceUpdated {
                user_id,
                balance: 42,
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let records = outbox.records_of_type("account_balance_updated").await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source, "paymentservice");
        assert_eq!(records[0].transport, "account_balance_updated");
        assert!(records[0].payload.contains(&user_id.to_string()));
    }

    #[tokio::test]
    async fn unregistered_event_fails_dispatch() {
        let outbox = MemoryOutbox::new();
        let tx = MemoryTransaction::new();
        let dispatcher = OutboxEventDispatcher::new(
            outbox.writer(&tx),
            Arc::new(integration::account_serializers()),
            "paymentservice",
        );

        let err = dispatcher
            .dispatch(&UserDeleted {
                user_id: UserId::new(),
                hard: true,
                deleted_at: Utc::now(),
            })
            .await
            .unwrap_err();
        tx.commit().await.unwrap();

        assert!(matches!(
            err,
            DomainError::Store(StoreError::UnregisteredEvent(tag)) if tag == "user_deleted"
        ));
        assert!(outbox.records().await.is_empty());
    }
}
