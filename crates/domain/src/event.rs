//! Domain events and their dispatch.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use store::StoreError;
use tokio::sync::Mutex;

use crate::Result;

/// An event raised by a domain service after a successful write.
pub trait DomainEvent: Any + Send + Sync + fmt::Debug {
    /// Stable type tag, e.g. `"account_balance_updated"`.
    fn event_type(&self) -> &'static str;

    /// Returns `self` for downcasting to the concrete event.
    fn as_any(&self) -> &dyn Any;

    /// Clones the event behind a new box.
    fn clone_event(&self) -> Box<dyn DomainEvent>;
}

/// Publishes domain events.
///
/// Implementations used inside a unit of work write to the transactional
/// outbox, so a failed dispatch aborts the surrounding transaction.
#[async_trait]
pub trait EventDispatcher: Send + Sync {
    /// Dispatches one event.
    async fn dispatch(&self, event: &dyn DomainEvent) -> Result<()>;
}

#[async_trait]
impl<T: EventDispatcher + ?Sized> EventDispatcher for Arc<T> {
    async fn dispatch(&self, event: &dyn DomainEvent) -> Result<()> {
        (**self).dispatch(event).await
    }
}

/// Dispatcher that keeps every event in memory.
#[derive(Clone, Default)]
pub struct RecordingDispatcher {
    events: Arc<Mutex<Vec<Box<dyn DomainEvent>>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingDispatcher {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent dispatches fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns the type tags of all recorded events, in order.
    pub async fn event_types(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .await
            .iter()
            .map(|event| event.event_type())
            .collect()
    }

    /// Returns recorded events of type `E`, in order.
    pub async fn events_of<E: DomainEvent + Clone>(&self) -> Vec<E> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|event| event.as_any().downcast_ref::<E>().cloned())
            .collect()
    }

    /// Returns the number of recorded events.
    pub async fn len(&self) -> usize {
        self.events.lock().await.len()
    }

    /// Returns true if nothing was recorded.
    pub async fn is_empty(&self) -> bool {
        self.events.lock().await.is_empty()
    }
}

#[async_trait]
impl EventDispatcher for RecordingDispatcher {
    async fn dispatch(&self, event: &dyn DomainEvent) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::UnregisteredEvent(event.event_type().to_string()).into());
        }
        self.events.lock().await.push(event.clone_event());
        Ok(())
    }
}

/// Change of a single field carried by an `Updated` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldChange<T> {
    /// The field kept its value.
    Unchanged,
    /// The field was set to a new value.
    Set(T),
    /// The optional field was cleared.
    Removed,
}

impl<T> Default for FieldChange<T> {
    fn default() -> Self {
        FieldChange::Unchanged
    }
}

impl<T: PartialEq + Clone> FieldChange<T> {
    /// Compares a required field.
    pub fn diff(current: &T, next: &T) -> Self {
        if current == next {
            FieldChange::Unchanged
        } else {
            FieldChange::Set(next.clone())
        }
    }

    /// Compares an optional field.
    pub fn diff_optional(current: &Option<T>, next: &Option<T>) -> Self {
        match (current, next) {
            (current, next) if current == next => FieldChange::Unchanged,
            (_, Some(value)) => FieldChange::Set(value.clone()),
            (Some(_), None) => FieldChange::Removed,
            (None, None) => FieldChange::Unchanged,
        }
    }
}

impl<T> FieldChange<T> {
    /// Returns true unless the field is unchanged.
    pub fn is_changed(&self) -> bool {
        !matches!(self, FieldChange::Unchanged)
    }

    /// Returns true if the field was cleared.
    pub fn is_removed(&self) -> bool {
        matches!(self, FieldChange::Removed)
    }

    /// Returns the new value, if one was set.
    pub fn value(&self) -> Option<&T> {
        match self {
            FieldChange::Set(value) => Some(value),
            _ => None,
        }
    }
}
