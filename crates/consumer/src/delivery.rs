//! Inbound message envelope.

use serde::de::DeserializeOwned;

use crate::error::Result;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A message handed over by the bus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Type tag, e.g. `user_deleted`.
    pub event_type: String,
    pub content_type: String,
    /// Id shared by every message caused by the same request.
    pub correlation_id: String,
    pub routing_key: String,
    pub body: Vec<u8>,
}

impl Delivery {
    /// A JSON delivery of the given type.
    pub fn json(event_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            event_type: event_type.into(),
            content_type: JSON_CONTENT_TYPE.to_string(),
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn with_routing_key(mut self, routing_key: impl Into<String>) -> Self {
        self.routing_key = routing_key.into();
        self
    }

    /// True only for exactly `application/json`; parameters or a different
    /// case are rejected.
    pub fn is_json(&self) -> bool {
        self.content_type == JSON_CONTENT_TYPE
    }

    /// Decodes the body.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// What the bus should do with a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Done with it, successfully or not.
    Ack,
    /// Negative acknowledgement; deliver again later.
    Requeue,
}
