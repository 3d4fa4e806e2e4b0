//! Workflow history storage.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tokio::sync::RwLock;

use crate::error::{Result, SagaError};
use crate::events::WorkflowEvent;

/// Append-only history per workflow id.
#[async_trait]
pub trait WorkflowStore: Send + Sync + 'static {
    /// Appends events after exactly `expected_sequence` existing ones.
    ///
    /// Returns the new sequence. Fails with `ConcurrencyConflict` when the
    /// history has moved on.
    async fn append(
        &self,
        workflow_id: &str,
        expected_sequence: u64,
        events: &[WorkflowEvent],
    ) -> Result<u64>;

    /// Loads the whole history in order. Unknown ids yield an empty history.
    async fn load(&self, workflow_id: &str) -> Result<Vec<WorkflowEvent>>;

    /// Ids of every workflow with a history.
    async fn workflow_ids(&self) -> Result<Vec<String>>;

    /// Ids of the workflows whose history does not end in a terminal event.
    async fn open_workflow_ids(&self) -> Result<Vec<String>>;
}

#[async_trait]
impl<S: WorkflowStore + ?Sized> WorkflowStore for Arc<S> {
    async fn append(
        &self,
        workflow_id: &str,
        expected_sequence: u64,
        events: &[WorkflowEvent],
    ) -> Result<u64> {
        (**self).append(workflow_id, expected_sequence, events).await
    }

    async fn load(&self, workflow_id: &str) -> Result<Vec<WorkflowEvent>> {
        (**self).load(workflow_id).await
    }

    async fn workflow_ids(&self) -> Result<Vec<String>> {
        (**self).workflow_ids().await
    }

    async fn open_workflow_ids(&self) -> Result<Vec<String>> {
        (**self).open_workflow_ids().await
    }
}

/// In-memory history store for tests and single-process runs.
#[derive(Clone, Default)]
pub struct MemoryWorkflowStore {
    histories: Arc<RwLock<BTreeMap<String, Vec<WorkflowEvent>>>>,
}

impl MemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for MemoryWorkflowStore {
    async fn append(
        &self,
        workflow_id: &str,
        expected_sequence: u64,
        events: &[WorkflowEvent],
    ) -> Result<u64> {
        let mut histories = self.histories.write().await;
        let history = histories.entry(workflow_id.to_string()).or_default();

        let actual = history.len() as u64;
        if actual != expected_sequence {
            return Err(SagaError::ConcurrencyConflict {
                workflow_id: workflow_id.to_string(),
                expected: expected_sequence,
                actual,
            });
        }

        history.extend_from_slice(events);
        Ok(history.len() as u64)
    }

    async fn load(&self, workflow_id: &str) -> Result<Vec<WorkflowEvent>> {
        let histories = self.histories.read().await;
        Ok(histories.get(workflow_id).cloned().unwrap_or_default())
    }

    async fn workflow_ids(&self) -> Result<Vec<String>> {
        let histories = self.histories.read().await;
        Ok(histories
            .iter()
            .filter(|(_, events)| !events.is_empty())
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn open_workflow_ids(&self) -> Result<Vec<String>> {
        let histories = self.histories.read().await;
        Ok(histories
            .iter()
            .filter(|(_, events)| events.last().is_some_and(|last| !last.is_terminal()))
            .map(|(id, _)| id.clone())
            .collect())
    }
}

/// PostgreSQL history store over the `workflow_events` table.
#[derive(Clone)]
pub struct PgWorkflowStore {
    pool: PgPool,
}

impl PgWorkflowStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowStore for PgWorkflowStore {
    async fn append(
        &self,
        workflow_id: &str,
        expected_sequence: u64,
        events: &[WorkflowEvent],
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let current: Option<i64> =
            sqlx::query_scalar("SELECT MAX(sequence) FROM workflow_events WHERE workflow_id = $1")
                .bind(workflow_id)
                .fetch_one(&mut *tx)
                .await?;
        let actual = current.unwrap_or(0) as u64;
        if actual != expected_sequence {
            return Err(SagaError::ConcurrencyConflict {
                workflow_id: workflow_id.to_string(),
                expected: expected_sequence,
                actual,
            });
        }

        let mut sequence = expected_sequence;
        for event in events {
            sequence += 1;
            sqlx::query(
                r#"
                INSERT INTO workflow_events (workflow_id, sequence, event_type, payload)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(workflow_id)
            .bind(sequence as i64)
            .bind(event.event_type())
            .bind(serde_json::to_value(event)?)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                // A concurrent writer took the same sequence number.
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return SagaError::ConcurrencyConflict {
                        workflow_id: workflow_id.to_string(),
                        expected: expected_sequence,
                        actual: sequence,
                    };
                }
                SagaError::Database(e)
            })?;
        }

        tx.commit().await?;
        Ok(sequence)
    }

    async fn load(&self, workflow_id: &str) -> Result<Vec<WorkflowEvent>> {
        let rows = sqlx::query(
            "SELECT payload FROM workflow_events WHERE workflow_id = $1 ORDER BY sequence",
        )
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<WorkflowEvent> {
                let payload: serde_json::Value = row.try_get("payload")?;
                Ok(serde_json::from_value(payload)?)
            })
            .collect()
    }

    async fn workflow_ids(&self) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT workflow_id FROM workflow_events ORDER BY workflow_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn open_workflow_ids(&self) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT workflow_id FROM (
                SELECT DISTINCT ON (workflow_id) workflow_id, event_type
                FROM workflow_events
                ORDER BY workflow_id, sequence DESC
            ) last_events
            WHERE event_type <> ALL($1)
            ORDER BY workflow_id
            "#,
        )
        .bind(&WorkflowEvent::TERMINAL_TYPES[..])
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use common::UserId;

    use super::*;

    #[tokio::test]
    async fn test_append_and_load() {
        let store = MemoryWorkflowStore::new();
        let started = WorkflowEvent::workflow_started("c1_del", UserId::new(), 30);

        let sequence = store
            .append("c1_del", 0, std::slice::from_ref(&started))
            .await
            .unwrap();
        assert_eq!(sequence, 1);

        let sequence = store
            .append("c1_del", 1, &[WorkflowEvent::timer_fired()])
            .await
            .unwrap();
        assert_eq!(sequence, 2);

        let history = store.load("c1_del").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], started);
        assert_eq!(store.workflow_ids().await.unwrap(), vec!["c1_del"]);
    }

    #[tokio::test]
    async fn test_stale_sequence_conflicts() {
        let store = MemoryWorkflowStore::new();
        let started = WorkflowEvent::workflow_started("c1_del", UserId::new(), 30);
        store.append("c1_del", 0, &[started.clone()]).await.unwrap();

        let err = store.append("c1_del", 0, &[started]).await.unwrap_err();

        assert!(matches!(
            err,
            SagaError::ConcurrencyConflict {
                expected: 0,
                actual: 1,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_open_workflows_exclude_finished_histories() {
        let store = MemoryWorkflowStore::new();
        for id in ["done", "failed", "retried", "waiting"] {
            let started = WorkflowEvent::workflow_started(id, UserId::new(), 30);
            store.append(id, 0, &[started]).await.unwrap();
        }
        store
            .append("done", 1, &[WorkflowEvent::workflow_completed()])
            .await
            .unwrap();
        store
            .append("failed", 1, &[WorkflowEvent::workflow_failed("exhausted")])
            .await
            .unwrap();
        store
            .append(
                "retried",
                1,
                &[
                    WorkflowEvent::workflow_failed("exhausted"),
                    WorkflowEvent::workflow_retried(),
                ],
            )
            .await
            .unwrap();

        assert_eq!(
            store.open_workflow_ids().await.unwrap(),
            vec!["retried", "waiting"]
        );
    }

    #[tokio::test]
    async fn test_unknown_workflow_has_empty_history() {
        let store = MemoryWorkflowStore::new();
        assert!(store.load("missing").await.unwrap().is_empty());
        assert!(store.workflow_ids().await.unwrap().is_empty());
    }
}
