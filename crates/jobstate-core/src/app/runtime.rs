use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{Job, JobStateError, TaskName, TaskOutcome};

/// Executes one task of a claimed job.
///
/// The handler reports failure through `TaskOutcome::Error`; the reason is
/// stored on the task.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, job: &Job, task: &TaskName) -> TaskOutcome;
}

/// Registry of handlers (task name -> handler).
///
/// Built during initialization, read-only afterwards.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<TaskName, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        task: TaskName,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<(), JobStateError> {
        if self.handlers.contains_key(&task) {
            return Err(JobStateError::validation(
                "taskName",
                format!("handler for {task} already registered"),
            ));
        }
        self.handlers.insert(task, handler);
        Ok(())
    }

    pub fn get(&self, task: &TaskName) -> Option<&Arc<dyn TaskHandler>> {
        self.handlers.get(task)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handler for the job's active task.
    ///
    /// A task without a handler is recorded as an error, so it goes through
    /// the normal retry ceiling instead of staying PROCESSING forever.
    pub async fn execute(&self, job: &Job) -> Option<(TaskName, TaskOutcome)> {
        let task = job.next_task_name.clone()?;
        let outcome = match self.get(&task) {
            Some(handler) => handler.handle(job, &task).await,
            None => TaskOutcome::error(format!("no handler registered for task {task}")),
        };
        Some((task, outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::domain::{JobConfig, JobId};

    struct OkHandler;

    #[async_trait]
    impl TaskHandler for OkHandler {
        async fn handle(&self, _job: &Job, _task: &TaskName) -> TaskOutcome {
            TaskOutcome::success()
        }
    }

    fn job() -> Job {
        Job::from_config(
            &JobConfig::new("ingest", ["extract", "load"]),
            JobId::new("j1"),
            None,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn executes_registered_handler() {
        let mut reg = HandlerRegistry::new();
        reg.register(TaskName::new("extract"), Arc::new(OkHandler))
            .unwrap();

        let (task, outcome) = reg.execute(&job()).await.unwrap();
        assert_eq!(task, TaskName::new("extract"));
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn missing_handler_is_an_error_outcome() {
        let reg = HandlerRegistry::new();

        let (_, outcome) = reg.execute(&job()).await.unwrap();
        match outcome {
            TaskOutcome::Error { reason } => assert!(reason.contains("no handler")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut reg = HandlerRegistry::new();
        reg.register(TaskName::new("extract"), Arc::new(OkHandler))
            .unwrap();
        assert!(reg
            .register(TaskName::new("extract"), Arc::new(OkHandler))
            .is_err());
        assert_eq!(reg.len(), 1);
    }
}
