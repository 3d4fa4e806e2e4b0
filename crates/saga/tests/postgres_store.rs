//! PostgreSQL integration tests for the workflow history store.
//!
//! Run with:
//!
//! ```bash
//! cargo test -p saga --test postgres_store -- --test-threads=1
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::UserId;
use saga::{
    Activity, ActivityError, LocalWorkflowService, PgWorkflowStore, SagaError, TokioTimer,
    WorkflowConfig, WorkflowEvent, WorkflowService, WorkflowState, WorkflowStore,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();
            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();
            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/007_create_workflow_events_table.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_pool() -> PgPool {
    let info = get_container_info().await;
    let pool = PgPool::connect(&info.connection_string).await.unwrap();
    sqlx::query("TRUNCATE workflow_events")
        .execute(&pool)
        .await
        .unwrap();
    pool
}

struct Succeeds;

#[async_trait]
impl Activity for Succeeds {
    fn name(&self) -> &'static str {
        "succeeds"
    }

    async fn run(&self, _user_id: UserId) -> Result<(), ActivityError> {
        Ok(())
    }
}

#[tokio::test]
#[serial]
async fn test_history_round_trips_through_jsonb() {
    let store = PgWorkflowStore::new(get_test_pool().await);
    let started = WorkflowEvent::workflow_started("c1_del", UserId::new(), 30_000);
    let failed = WorkflowEvent::attempt_failed("hard_delete_user", 1, "unavailable");

    let sequence = store
        .append("c1_del", 0, &[started.clone(), failed.clone()])
        .await
        .unwrap();

    assert_eq!(sequence, 2);
    assert_eq!(store.load("c1_del").await.unwrap(), vec![started, failed]);
    assert_eq!(store.workflow_ids().await.unwrap(), vec!["c1_del"]);
}

#[tokio::test]
#[serial]
async fn test_open_workflows_skip_terminal_histories() {
    let store = PgWorkflowStore::new(get_test_pool().await);
    for id in ["a_done", "b_waiting", "c_retried"] {
        store
            .append(id, 0, &[WorkflowEvent::workflow_started(id, UserId::new(), 0)])
            .await
            .unwrap();
    }
    store
        .append("a_done", 1, &[WorkflowEvent::workflow_completed()])
        .await
        .unwrap();
    store
        .append(
            "c_retried",
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
        vec!["b_waiting", "c_retried"]
    );
}

#[tokio::test]
#[serial]
async fn test_second_start_conflicts() {
    let store = PgWorkflowStore::new(get_test_pool().await);
    let user_id = UserId::new();
    store
        .append(
            "c1_del",
            0,
            &[WorkflowEvent::workflow_started("c1_del", user_id, 0)],
        )
        .await
        .unwrap();

    let err = store
        .append(
            "c1_del",
            0,
            &[WorkflowEvent::workflow_started("c1_del", user_id, 0)],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SagaError::ConcurrencyConflict { .. }));
}

#[tokio::test]
#[serial]
async fn test_workflow_runs_against_postgres() {
    let store = PgWorkflowStore::new(get_test_pool().await);
    let workflows = LocalWorkflowService::new(
        store.clone(),
        TokioTimer,
        Arc::new(Succeeds),
        WorkflowConfig {
            grace_period: Duration::from_millis(10),
            ..WorkflowConfig::default()
        },
    );

    workflows
        .run_user_deleted_workflow("c2_del", UserId::new())
        .await
        .unwrap();
    let duplicate = workflows
        .run_user_deleted_workflow("c2_del", UserId::new())
        .await
        .unwrap_err();

    assert!(duplicate.is_already_started());
    assert_eq!(
        workflows.wait("c2_del").await.unwrap(),
        WorkflowState::Completed
    );
    assert_eq!(store.load("c2_del").await.unwrap().len(), 5);
}
