//! Job record and state derivation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::JobConfig;
use super::ids::{JobId, JobKey, JobName, TaskName};
use super::retry::RetryPolicy;
use super::sequencer::next_task_name;
use super::state::{IllegalTransition, JobState, TaskState};
use super::task::Task;

/// Job record: an ordered collection of tasks under `(job_name, job_id)`.
///
/// Design:
/// - Task mutations go through `Task` methods, followed by `refresh()`.
/// - `version` is the optimistic counter; only the store bumps it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_name: JobName,
    pub job_id: JobId,
    pub description: Option<String>,
    pub created_timestamp: DateTime<Utc>,
    pub state: JobState,
    pub next_task_name: Option<TaskName>,
    pub tasks: Vec<Task>,
    pub deleted: bool,
    pub version: u64,
}

impl Job {
    /// Instantiate a job from its type's template, in configured task order.
    /// The job starts as New and is evaluated immediately (normally to Ready).
    pub fn from_config(
        config: &JobConfig,
        job_id: JobId,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let tasks = config
            .tasks
            .iter()
            .map(|t| Task::new(t.name.clone(), t.description.clone()))
            .collect();
        let mut job = Self {
            job_name: config.name.clone(),
            job_id,
            description,
            created_timestamp: now,
            state: JobState::New,
            next_task_name: None,
            tasks,
            deleted: false,
            version: 0,
        };
        job.refresh(&config.retry_policy());
        job
    }

    pub fn key(&self) -> JobKey {
        JobKey::new(self.job_name.clone(), self.job_id.clone())
    }

    pub fn task(&self, name: &TaskName) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.name == name)
    }

    pub fn task_mut(&mut self, name: &TaskName) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| &t.name == name)
    }

    /// The task `next_task_name` points at.
    pub fn active_task(&self) -> Option<&Task> {
        self.next_task_name.as_ref().and_then(|name| self.task(name))
    }

    /// Errors counted against the job-level ceiling.
    pub fn job_error_count(&self) -> u32 {
        self.tasks
            .iter()
            .map(Task::retry_error_count)
            .fold(0, u32::saturating_add)
    }

    /// Re-run the sequencer and re-derive the job state.
    /// Call after every task mutation.
    pub fn refresh(&mut self, policy: &RetryPolicy) {
        self.next_task_name =
            next_task_name(self.tasks.iter().map(|t| (&t.name, t.state))).cloned();
        self.state = derive_job_state(&self.tasks, self.next_task_name.as_ref(), policy);
    }

    /// Claim the active task: mark it Processing and refresh the job.
    pub fn begin_active_task(
        &mut self,
        now: DateTime<Utc>,
        policy: &RetryPolicy,
    ) -> Result<(), IllegalTransition> {
        let Some(name) = self.next_task_name.clone() else {
            return Err(IllegalTransition {
                from: TaskState::Completed,
                to: TaskState::Processing,
            });
        };
        if let Some(task) = self.task_mut(&name) {
            task.start_attempt(now, policy)?;
        }
        self.refresh(policy);
        Ok(())
    }

    /// Stop counting the errors recorded so far against either ceiling.
    /// `error_count` totals are kept.
    pub fn restart_error_budget(&mut self) {
        for task in &mut self.tasks {
            task.reset_baseline = task.error_count;
        }
    }

    /// Logical delete: the job and every task are flagged, nothing is purged.
    pub fn mark_deleted(&mut self) {
        self.deleted = true;
        for task in &mut self.tasks {
            task.deleted = true;
        }
    }
}

/// Job state as a function of its tasks.
///
/// - Completed iff every task is Completed
/// - Error iff the active task is Error and may not be retried automatically
///   (task ceiling reached, or the job-level ceiling reached)
/// - Processing iff the active task is Processing
/// - Ready otherwise
pub fn derive_job_state(
    tasks: &[Task],
    next_task_name: Option<&TaskName>,
    policy: &RetryPolicy,
) -> JobState {
    if tasks.iter().all(|t| t.state == TaskState::Completed) {
        return JobState::Completed;
    }
    let active = next_task_name.and_then(|name| tasks.iter().find(|t| &t.name == name));
    match active.map(|t| t.state) {
        Some(TaskState::Error) => {
            let active = active.map(Task::retry_error_count).unwrap_or_default();
            let job_errors = tasks
                .iter()
                .map(Task::retry_error_count)
                .fold(0, u32::saturating_add);
            if !policy.is_task_retry_eligible(active) || policy.is_job_exhausted(job_errors) {
                JobState::Error
            } else {
                JobState::Ready
            }
        }
        Some(TaskState::Processing) => JobState::Processing,
        _ => JobState::Ready,
    }
}
