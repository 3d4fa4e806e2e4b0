//! Inbound integration-event consumers.
//!
//! A [`Consumer`] receives [`Delivery`] envelopes from the bus, routes them
//! by event type through a [`HandlerRegistry`] and answers with an
//! [`Outcome`]. Handlers are idempotent, so at-least-once delivery is safe.

pub mod consumer;
pub mod delivery;
pub mod error;
pub mod handler;
pub mod handlers;

pub use consumer::Consumer;
pub use delivery::{Delivery, JSON_CONTENT_TYPE, Outcome};
pub use error::{ConsumerError, Result};
pub use handler::{EventHandler, HandlerRegistry};
