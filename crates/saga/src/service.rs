//! In-process workflow runner.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::UserId;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::activity::Activity;
use crate::error::{ActivityError, Result, SagaError};
use crate::events::WorkflowEvent;
use crate::instance::WorkflowInstance;
use crate::retry::RetryPolicy;
use crate::state::WorkflowState;
use crate::store::WorkflowStore;
use crate::timer::{DurableTimer, TokioTimer};

/// Workflow use cases offered to consumers and operators.
#[async_trait]
pub trait WorkflowService: Send + Sync {
    /// Starts the delayed hard delete of a user under the given id.
    ///
    /// Fails with `AlreadyStarted` if the id was used before.
    async fn run_user_deleted_workflow(&self, workflow_id: &str, user_id: UserId) -> Result<()>;

    async fn find_workflow(&self, workflow_id: &str) -> Result<WorkflowInstance>;

    /// Re-runs a failed workflow's activity with a fresh attempt budget.
    async fn retry_failed(&self, workflow_id: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Wait between the soft delete and the hard delete.
    pub grace_period: Duration,
    pub retry: RetryPolicy,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

struct Runner<S, T> {
    store: S,
    timer: T,
    activity: Arc<dyn Activity>,
    config: WorkflowConfig,
}

/// Runs workflows as tokio tasks, recording every step in a [`WorkflowStore`].
///
/// A process restart loses the tasks but not the history; call
/// [`LocalWorkflowService::resume_incomplete`] at startup to pick them up.
pub struct LocalWorkflowService<S, T = TokioTimer> {
    runner: Arc<Runner<S, T>>,
    tasks: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}

impl<S, T> Clone for LocalWorkflowService<S, T> {
    fn clone(&self) -> Self {
        Self {
            runner: self.runner.clone(),
            tasks: self.tasks.clone(),
        }
    }
}

impl<S, T> LocalWorkflowService<S, T>
where
    S: WorkflowStore,
    T: DurableTimer,
{
    pub fn new(store: S, timer: T, activity: Arc<dyn Activity>, config: WorkflowConfig) -> Self {
        Self {
            runner: Arc::new(Runner {
                store,
                timer,
                activity,
                config,
            }),
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Waits for the workflow's running task, if any, and returns its state.
    pub async fn wait(&self, workflow_id: &str) -> Result<WorkflowState> {
        let handle = self.tasks.lock().await.remove(workflow_id);
        if let Some(handle) = handle
            && let Err(err) = handle.await
        {
            tracing::warn!(workflow_id, error = %err, "workflow task did not finish");
        }
        Ok(self.find_workflow(workflow_id).await?.state())
    }

    /// Restarts every non-terminal workflow that is not already running.
    /// Returns how many were restarted.
    #[tracing::instrument(skip(self))]
    pub async fn resume_incomplete(&self) -> Result<usize> {
        let mut resumed = 0;
        for workflow_id in self.runner.store.open_workflow_ids().await? {
            if self.is_running(&workflow_id).await {
                continue;
            }
            let instance = match self.runner.load(&workflow_id).await {
                Ok(instance) => instance,
                Err(err @ SagaError::CorruptHistory(_)) => {
                    tracing::error!(%workflow_id, error = %err, "skipping corrupt workflow");
                    continue;
                }
                Err(err) => return Err(err),
            };
            tracing::info!(
                workflow_id = %workflow_id,
                state = %instance.state(),
                "resuming workflow"
            );
            self.spawn(instance).await;
            resumed += 1;
        }
        Ok(resumed)
    }

    /// Stops every running task. Histories stay intact for a later resume.
    pub async fn shutdown(&self) {
        let tasks: Vec<_> = self.tasks.lock().await.drain().collect();
        let count = tasks.len();
        for (_, handle) in tasks {
            handle.abort();
            let _ = handle.await;
        }
        tracing::info!(count, "workflow runner stopped");
    }

    async fn is_running(&self, workflow_id: &str) -> bool {
        self.tasks
            .lock()
            .await
            .get(workflow_id)
            .is_some_and(|handle| !handle.is_finished())
    }

    async fn spawn(&self, instance: WorkflowInstance) {
        let workflow_id = instance.workflow_id().to_string();
        let runner = self.runner.clone();
        let task_id = workflow_id.clone();
        let handle = tokio::spawn(async move { runner.supervise(task_id, instance).await });

        let mut tasks = self.tasks.lock().await;
        tasks.retain(|_, handle| !handle.is_finished());
        tasks.insert(workflow_id, handle);
    }
}

#[async_trait]
impl<S, T> WorkflowService for LocalWorkflowService<S, T>
where
    S: WorkflowStore,
    T: DurableTimer,
{
    #[tracing::instrument(skip(self))]
    async fn run_user_deleted_workflow(&self, workflow_id: &str, user_id: UserId) -> Result<()> {
        let grace_ms = u64::try_from(self.runner.config.grace_period.as_millis()).unwrap_or(u64::MAX);
        let started = WorkflowEvent::workflow_started(workflow_id, user_id, grace_ms);

        match self
            .runner
            .store
            .append(workflow_id, 0, std::slice::from_ref(&started))
            .await
        {
            Err(SagaError::ConcurrencyConflict { .. }) => {
                return Err(SagaError::AlreadyStarted(workflow_id.to_string()));
            }
            other => other?,
        };

        metrics::counter!("workflow_started_total").increment(1);
        tracing::info!(workflow_id, user_id = %user_id, "workflow started");

        let instance = WorkflowInstance::replay(workflow_id, &[started])?;
        self.spawn(instance).await;
        Ok(())
    }

    async fn find_workflow(&self, workflow_id: &str) -> Result<WorkflowInstance> {
        self.runner.load(workflow_id).await
    }

    #[tracing::instrument(skip(self))]
    async fn retry_failed(&self, workflow_id: &str) -> Result<()> {
        let mut instance = self.find_workflow(workflow_id).await?;
        if instance.state() != WorkflowState::Failed {
            return Err(SagaError::InvalidState {
                expected: WorkflowState::Failed,
                actual: instance.state(),
            });
        }

        self.runner
            .record(&mut instance, WorkflowEvent::workflow_retried())
            .await?;
        tracing::info!(workflow_id, "workflow retried");

        self.spawn(instance).await;
        Ok(())
    }
}

impl<S, T> Runner<S, T>
where
    S: WorkflowStore,
    T: DurableTimer,
{
    async fn load(&self, workflow_id: &str) -> Result<WorkflowInstance> {
        let history = self.store.load(workflow_id).await?;
        if history.is_empty() {
            return Err(SagaError::NotFound(workflow_id.to_string()));
        }
        WorkflowInstance::replay(workflow_id, &history)
    }

    /// Drives a workflow to a terminal state. After a failed step the
    /// instance is rebuilt from its history and driving resumes, with the
    /// retry policy's backoff between rounds. Only a missing or corrupt
    /// history ends the task early.
    async fn supervise(&self, workflow_id: String, instance: WorkflowInstance) {
        let mut instance = Some(instance);
        let mut failures = 0;
        loop {
            let step = match instance.take() {
                Some(instance) => self.drive(instance).await,
                None => match self.load(&workflow_id).await {
                    Ok(loaded) => {
                        instance = Some(loaded);
                        continue;
                    }
                    Err(err) => Err(err),
                },
            };
            let err = match step {
                Ok(()) => return,
                Err(err @ (SagaError::CorruptHistory(_) | SagaError::NotFound(_))) => {
                    tracing::error!(%workflow_id, error = %err, "workflow abandoned");
                    return;
                }
                Err(err) => err,
            };

            failures += 1;
            let delay = self.config.retry.delay_after(failures);
            tracing::error!(
                %workflow_id,
                error = %err,
                retry_in_ms = delay.as_millis() as u64,
                "workflow step failed, resuming from history"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn drive(&self, mut instance: WorkflowInstance) -> Result<()> {
        loop {
            match instance.state() {
                WorkflowState::Pending => {
                    let wake_at = instance.wake_at();
                    self.record(&mut instance, WorkflowEvent::timer_scheduled(wake_at))
                        .await?;
                }
                WorkflowState::Waiting => {
                    self.timer.sleep_until(instance.wake_at()).await;
                    self.record(&mut instance, WorkflowEvent::timer_fired())
                        .await?;
                }
                WorkflowState::Executing => self.execute(&mut instance).await?,
                WorkflowState::Completed | WorkflowState::Failed => return Ok(()),
            }
        }
    }

    /// Runs attempts until one succeeds or the budget is spent.
    async fn execute(&self, instance: &mut WorkflowInstance) -> Result<()> {
        let policy = &self.config.retry;
        let activity = self.activity.name();

        loop {
            if instance.attempts() >= policy.max_attempts {
                return self.fail(instance, activity).await;
            }

            let attempt = instance.attempts() + 1;
            metrics::counter!("workflow_activity_attempts_total", "activity" => activity)
                .increment(1);
            let outcome =
                match tokio::time::timeout(policy.attempt_timeout, self.activity.run(instance.user_id()))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ActivityError::TimedOut(policy.attempt_timeout)),
                };

            match outcome {
                Ok(()) => {
                    self.record(instance, WorkflowEvent::activity_completed(activity, attempt))
                        .await?;
                    self.record(instance, WorkflowEvent::workflow_completed())
                        .await?;
                    metrics::counter!("workflow_completed_total").increment(1);
                    tracing::info!(
                        workflow_id = instance.workflow_id(),
                        attempt,
                        "workflow completed"
                    );
                    return Ok(());
                }
                Err(err) => {
                    tracing::warn!(
                        workflow_id = instance.workflow_id(),
                        activity,
                        attempt,
                        error = %err,
                        "activity attempt failed"
                    );
                    self.record(
                        instance,
                        WorkflowEvent::attempt_failed(activity, attempt, err.to_string()),
                    )
                    .await?;
                    if policy.allows_retry_after(attempt) {
                        tokio::time::sleep(policy.delay_after(attempt)).await;
                    }
                }
            }
        }
    }

    async fn fail(&self, instance: &mut WorkflowInstance, activity: &str) -> Result<()> {
        let reason = format!(
            "{activity} failed after {} attempts: {}",
            instance.attempts(),
            instance.last_error().unwrap_or("unknown error")
        );
        self.record(instance, WorkflowEvent::workflow_failed(reason.clone()))
            .await?;
        metrics::counter!("workflow_failed_total").increment(1);
        tracing::error!(
            workflow_id = instance.workflow_id(),
            user_id = %instance.user_id(),
            reason = %reason,
            "workflow failed"
        );
        Ok(())
    }

    /// Appends an event and applies it. Illegal events are refused before
    /// they reach the history.
    async fn record(&self, instance: &mut WorkflowInstance, event: WorkflowEvent) -> Result<()> {
        let mut next = instance.clone();
        next.apply(&event)?;
        self.store
            .append(
                instance.workflow_id(),
                instance.sequence(),
                std::slice::from_ref(&event),
            )
            .await?;
        *instance = next;
        Ok(())
    }
}
