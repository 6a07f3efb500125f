use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use jobstate_core::app::TaskHandler;
use jobstate_core::domain::{Job, TaskName, TaskOutcome};
use tracing::info;

/// Stand-in handler: fails the first `n` calls, then succeeds.
pub struct DemoHandler {
    remaining_failures: AtomicU32,
    work: Duration,
}

impl DemoHandler {
    pub fn new(fail_first: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(fail_first),
            work: Duration::from_millis(20),
        }
    }
}

#[async_trait]
impl TaskHandler for DemoHandler {
    async fn handle(&self, job: &Job, task: &TaskName) -> TaskOutcome {
        tokio::time::sleep(self.work).await;

        let left = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if let Ok(left) = left {
            return TaskOutcome::error(format!("intentional failure (left={left})"));
        }

        info!(job = %job.key(), task = %task, "demo task done");
        TaskOutcome::success()
    }
}
