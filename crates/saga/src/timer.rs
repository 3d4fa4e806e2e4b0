//! Timers for the grace-period wait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Sleeps until an absolute instant.
///
/// The instant is recorded in the workflow history before the sleep starts,
/// so a restarted runner waits only for what remains.
#[async_trait]
pub trait DurableTimer: Send + Sync + 'static {
    async fn sleep_until(&self, wake_at: DateTime<Utc>);
}

/// Wall-clock timer on the tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

#[async_trait]
impl DurableTimer for TokioTimer {
    async fn sleep_until(&self, wake_at: DateTime<Utc>) {
        // Instants already in the past do not sleep.
        if let Ok(remaining) = (wake_at - Utc::now()).to_std() {
            tokio::time::sleep(remaining).await;
        }
    }
}
