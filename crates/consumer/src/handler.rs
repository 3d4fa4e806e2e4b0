//! Event handler trait and registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::delivery::Delivery;
use crate::error::Result;

/// Handles deliveries of one event type.
///
/// Handlers must tolerate redelivery: the bus delivers at least once.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, delivery: &Delivery) -> Result<()>;
}

/// Maps event type tags to their handler.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Arc<dyn EventHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler, replacing any earlier one for the same type.
    pub fn register(mut self, event_type: &'static str, handler: impl EventHandler + 'static) -> Self {
        self.handlers.insert(event_type, Arc::new(handler));
        self
    }

    pub fn get(&self, event_type: &str) -> Option<&Arc<dyn EventHandler>> {
        self.handlers.get(event_type)
    }

    pub fn contains(&self, event_type: &str) -> bool {
        self.handlers.contains_key(event_type)
    }

    /// Registered types, sorted.
    pub fn event_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.handlers.keys().copied().collect();
        types.sort_unstable();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl EventHandler for Noop {
        async fn handle(&self, _delivery: &Delivery) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_registry_lookup() {
        let registry = HandlerRegistry::new()
            .register("user_deleted", Noop)
            .register("user_created", Noop);

        assert!(registry.contains("user_created"));
        assert!(registry.get("unknown_event_v2").is_none());
        assert_eq!(registry.event_types(), vec!["user_created", "user_deleted"]);
    }
}
