//! Event type tag to serializer mapping.

use std::any::Any;
use std::collections::HashMap;

use serde::Serialize;

use crate::{Result, StoreError};

type SerializeFn = Box<dyn Fn(&dyn Any) -> Result<String> + Send + Sync>;

/// Maps stable event type tags to JSON serializers.
///
/// Built once at startup and shared by reference with every dispatcher.
/// Each entry converts the in-process event into its wire representation
/// before encoding, so domain types never carry serde attributes for the bus.
#[derive(Default)]
pub struct SerializerRegistry {
    serializers: HashMap<&'static str, SerializeFn>,
}

impl SerializerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `convert` as the wire mapping for events of type `E`
    /// published under `event_type`.
    pub fn register<E, W, F>(mut self, event_type: &'static str, convert: F) -> Self
    where
        E: Any,
        W: Serialize,
        F: Fn(&E) -> W + Send + Sync + 'static,
    {
        self.serializers.insert(
            event_type,
            Box::new(move |event: &dyn Any| {
                let event = event
                    .downcast_ref::<E>()
                    .ok_or_else(|| StoreError::EventMismatch(event_type.to_string()))?;
                Ok(serde_json::to_string(&convert(event))?)
            }),
        );
        self
    }

    /// Serializes `event` with the serializer registered for `event_type`.
    pub fn serialize(&self, event_type: &str, event: &dyn Any) -> Result<String> {
        let serializer = self
            .serializers
            .get(event_type)
            .ok_or_else(|| StoreError::UnregisteredEvent(event_type.to_string()))?;
        serializer(event)
    }

    /// Returns true if a serializer is registered for `event_type`.
    pub fn contains(&self, event_type: &str) -> bool {
        self.serializers.contains_key(event_type)
    }

    /// Returns the registered tags, sorted.
    pub fn event_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.serializers.keys().copied().collect();
        types.sort_unstable();
        types
    }
}

impl std::fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializerRegistry")
            .field("event_types", &self.event_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BalanceChanged {
        user: &'static str,
        balance: i64,
    }

    #[derive(Serialize)]
    struct BalanceChangedWire {
        user_id: String,
        balance: i64,
    }

    fn registry() -> SerializerRegistry {
        SerializerRegistry::new().register("balance_changed", |event: &BalanceChanged| {
            BalanceChangedWire {
                user_id: event.user.to_string(),
                balance: event.balance,
            }
        })
    }

    #[test]
    fn serializes_registered_event() {
        let event = BalanceChanged {
            user: "u1",
            balance: 150,
        };
        let json = registry().serialize("balance_changed", &event).unwrap();
        assert_eq!(json, r#"{"user_id":"u1","balance":150}"#);
    }

    #[test]
    fn unregistered_tag_fails() {
        let event = BalanceChanged {
            user: "u1",
            balance: 1,
        };
        let err = registry().serialize("unknown", &event).unwrap_err();
        assert!(matches!(err, StoreError::UnregisteredEvent(tag) if tag == "unknown"));
    }

    #[test]
    fn mismatched_event_type_fails() {
        let err = registry().serialize("balance_changed", &42_u32).unwrap_err();
        assert!(matches!(err, StoreError::EventMismatch(_)));
    }

    #[test]
    fn lists_registered_tags() {
        let registry = registry().register("other", |_: &u32| 0);
        assert_eq!(registry.event_types(), vec!["balance_changed", "other"]);
        assert!(registry.contains("other"));
    }
}
