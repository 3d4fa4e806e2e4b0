//! Delivery dispatch and acknowledgement policy.

use std::time::Instant;

use crate::delivery::{Delivery, Outcome};
use crate::handler::HandlerRegistry;

/// Routes deliveries to handlers and decides how each is acknowledged.
///
/// - non-JSON content: acknowledged and skipped
/// - unknown event type: acknowledged and skipped
/// - malformed payload: acknowledged, logged as an error
/// - any other handler failure: requeued
pub struct Consumer {
    name: &'static str,
    handlers: HandlerRegistry,
}

impl Consumer {
    pub fn new(name: &'static str, handlers: HandlerRegistry) -> Self {
        Self { name, handlers }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn event_types(&self) -> Vec<&'static str> {
        self.handlers.event_types()
    }

    #[tracing::instrument(
        skip(self, delivery),
        fields(
            consumer = self.name,
            event_type = %delivery.event_type,
            routing_key = %delivery.routing_key,
            correlation_id = %delivery.correlation_id,
            content_type = %delivery.content_type,
        )
    )]
    pub async fn consume(&self, delivery: &Delivery) -> Outcome {
        let start = Instant::now();
        let (outcome, status) = self.dispatch(delivery).await;

        // Unregistered types share one label to bound cardinality.
        let event_type = if self.handlers.contains(&delivery.event_type) {
            delivery.event_type.clone()
        } else {
            "unknown".to_string()
        };
        metrics::histogram!(
            "consumer_event_duration_seconds",
            "event_type" => event_type,
            "status" => status
        )
        .record(start.elapsed().as_secs_f64());

        outcome
    }

    async fn dispatch(&self, delivery: &Delivery) -> (Outcome, &'static str) {
        if !delivery.is_json() {
            tracing::warn!("unsupported content type, skipping");
            return (Outcome::Ack, "skipped");
        }

        let Some(handler) = self.handlers.get(&delivery.event_type) else {
            tracing::info!("no handler for event type, skipping");
            return (Outcome::Ack, "skipped");
        };

        match handler.handle(delivery).await {
            Ok(()) => {
                tracing::debug!("event handled");
                (Outcome::Ack, "ok")
            }
            Err(err) if err.is_malformed() => {
                tracing::warn!(error = %err, "malformed event, dropping");
                (Outcome::Ack, "malformed")
            }
            Err(err) => {
                tracing::error!(error = %err, "event handling failed, requeueing");
                (Outcome::Requeue, "error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use domain::DomainError;

    use super::*;
    use crate::error::Result;
    use crate::handler::EventHandler;

    #[derive(Clone, Default)]
    struct Counting {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl EventHandler for Counting {
        async fn handle(&self, delivery: &Delivery) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            delivery.decode::<serde_json::Value>()?;
            if self.fail {
                return Err(DomainError::not_found("user").into());
            }
            Ok(())
        }
    }

    fn consumer(handler: Counting) -> Consumer {
        Consumer::new("test", HandlerRegistry::new().register("user_created", handler))
    }

    #[tokio::test]
    async fn test_handled_event_is_acked() {
        let handler = Counting::default();
        let consumer = consumer(handler.clone());

        let outcome = consumer.consume(&Delivery::json("user_created", "{}")).await;

        assert_eq!(outcome, Outcome::Ack);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_json_is_acked_without_handling() {
        let handler = Counting::default();
        let consumer = consumer(handler.clone());
        let mut delivery = Delivery::json("user_created", "{}");
        delivery.content_type = "text/plain".to_string();

        assert_eq!(consumer.consume(&delivery).await, Outcome::Ack);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_type_is_acked() {
        let consumer = consumer(Counting::default());
        let outcome = consumer
            .consume(&Delivery::json("unknown_event_v2", "{}"))
            .await;
        assert_eq!(outcome, Outcome::Ack);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_acked() {
        let consumer = consumer(Counting::default());
        let outcome = consumer
            .consume(&Delivery::json("user_created", "{not json"))
            .await;
        assert_eq!(outcome, Outcome::Ack);
    }

    #[tokio::test]
    async fn test_handler_failure_is_requeued() {
        let consumer = consumer(Counting {
            fail: true,
            ..Counting::default()
        });
        let outcome = consumer.consume(&Delivery::json("user_created", "{}")).await;
        assert_eq!(outcome, Outcome::Requeue);
    }
}
