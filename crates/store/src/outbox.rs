//! Transactional outbox.
//!
//! Records are appended inside the transaction that changes aggregate state.
//! An external relay reads unpublished records and hands them to the message
//! bus with at-least-once delivery.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Result, StoreError};

/// A serialized integration event waiting to be relayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxRecord {
    /// Time-ordered record identifier.
    pub id: Uuid,

    /// Application id of the producing service (e.g. "userservice").
    pub source: String,

    /// Routing name the relay publishes to.
    pub transport: String,

    /// Stable event type tag, e.g. "account_balance_updated".
    pub event_type: String,

    /// JSON body of the event.
    pub payload: String,

    /// When the record was written.
    pub created_at: DateTime<Utc>,

    /// When the relay published the record, if it has.
    pub published_at: Option<DateTime<Utc>>,
}

impl OutboxRecord {
    /// Creates a new record builder.
    pub fn builder() -> OutboxRecordBuilder {
        OutboxRecordBuilder::default()
    }
}

/// Builder for [`OutboxRecord`].
#[derive(Debug, Default)]
pub struct OutboxRecordBuilder {
    source: Option<String>,
    transport: Option<String>,
    event_type: Option<String>,
    payload: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl OutboxRecordBuilder {
    /// Sets the producing application id.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the routing name. Defaults to the event type.
    pub fn transport(mut self, transport: impl Into<String>) -> Self {
        self.transport = Some(transport.into());
        self
    }

    /// Sets the event type tag.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Sets the serialized body.
    pub fn payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Sets the creation time. Defaults to now.
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Builds the record, failing if source, event type or payload are missing.
    pub fn build(self) -> Result<OutboxRecord> {
        let event_type = self
            .event_type
            .ok_or(StoreError::InvalidRecord("event_type"))?;
        Ok(OutboxRecord {
            id: Uuid::now_v7(),
            source: self.source.ok_or(StoreError::InvalidRecord("source"))?,
            transport: self.transport.unwrap_or_else(|| event_type.clone()),
            event_type,
            payload: self.payload.ok_or(StoreError::InvalidRecord("payload"))?,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            published_at: None,
        })
    }
}

/// Appends outbox records within the current transaction.
#[async_trait]
pub trait OutboxWriter: Send + Sync {
    /// Appends a record. It becomes visible only if the transaction commits.
    async fn append(&self, record: OutboxRecord) -> Result<()>;
}

/// Relay-facing view of the outbox.
#[async_trait]
pub trait OutboxReader: Send + Sync {
    /// Returns up to `limit` unpublished records, oldest first.
    async fn pending(&self, limit: usize) -> Result<Vec<OutboxRecord>>;

    /// Marks records as published. Returns how many were updated.
    async fn mark_published(&self, ids: &[Uuid]) -> Result<u64>;
}
