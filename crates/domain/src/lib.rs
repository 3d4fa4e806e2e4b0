//! Domain layer of the consistency services.
//!
//! Each aggregate module owns:
//! - the aggregate model and its find specification,
//! - the repository contract (with an in-memory implementation),
//! - the domain events it raises,
//! - a domain service enforcing the aggregate's invariants.
//!
//! Domain services depend only on their repository and an
//! [`EventDispatcher`]; transactions and locks are the caller's concern.

macro_rules! domain_event {
    ($event:ident, $tag:literal) => {
        impl $event {
            /// Stable type tag of this event on the bus.
            pub const EVENT_TYPE: &'static str = $tag;
        }

        impl $crate::event::DomainEvent for $event {
            fn event_type(&self) -> &'static str {
                Self::EVENT_TYPE
            }

            fn as_any(&self) -> &dyn std::any::Any {
                self
            }

            fn clone_event(&self) -> Box<dyn $crate::event::DomainEvent> {
                Box::new(self.clone())
            }
        }
    };
}

pub mod account;
pub mod error;
pub mod event;
pub mod notification;
pub mod order;
pub mod product;
pub mod user;

pub use error::{DomainError, Result};
pub use event::{DomainEvent, EventDispatcher, FieldChange, RecordingDispatcher};
pub use order::OrderError;
