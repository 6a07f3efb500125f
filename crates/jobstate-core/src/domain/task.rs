//! Task record: one step of a job's pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TaskName;
use super::retry::RetryPolicy;
use super::state::{IllegalTransition, TaskState};

/// A task inside a job.
///
/// Invariants:
/// - `end_timestamp` is set iff `state` is Completed or Error.
/// - `error_reason` is set only in Error.
/// - `error_count` never decreases; `reset_baseline` remembers the count at
///   the last reset so retry eligibility restarts while the audit total stays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub name: TaskName,
    pub description: Option<String>,
    pub state: TaskState,
    pub start_timestamp: Option<DateTime<Utc>>,
    pub end_timestamp: Option<DateTime<Utc>>,
    pub error_reason: Option<String>,
    pub error_count: u32,
    pub reset_baseline: u32,
    pub deleted: bool,
}

impl Task {
    pub fn new(name: TaskName, description: Option<String>) -> Self {
        Self {
            name,
            description,
            state: TaskState::New,
            start_timestamp: None,
            end_timestamp: None,
            error_reason: None,
            error_count: 0,
            reset_baseline: 0,
            deleted: false,
        }
    }

    /// Errors counted against the retry ceiling (since the last reset).
    pub fn retry_error_count(&self) -> u32 {
        self.error_count.saturating_sub(self.reset_baseline)
    }

    /// Mark as processing. `Error -> Processing` also requires the task to be
    /// retry eligible.
    pub fn start_attempt(
        &mut self,
        now: DateTime<Utc>,
        policy: &RetryPolicy,
    ) -> Result<(), IllegalTransition> {
        let to = TaskState::Processing;
        if self.state == TaskState::Error && !policy.is_task_retry_eligible(self.retry_error_count())
        {
            return Err(IllegalTransition {
                from: self.state,
                to,
            });
        }
        self.state = self.state.transition(to)?;
        self.start_timestamp = Some(now);
        self.end_timestamp = None;
        Ok(())
    }

    /// Mark as completed.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) -> Result<(), IllegalTransition> {
        self.state = self.state.transition(TaskState::Completed)?;
        self.end_timestamp = Some(now);
        self.error_reason = None;
        Ok(())
    }

    /// Mark as errored; counts one more error.
    pub fn mark_error(
        &mut self,
        now: DateTime<Utc>,
        reason: String,
    ) -> Result<(), IllegalTransition> {
        self.state = self.state.transition(TaskState::Error)?;
        self.end_timestamp = Some(now);
        self.error_reason = Some(reason);
        self.error_count = self.error_count.saturating_add(1);
        Ok(())
    }

    /// Move from Error back to New. `error_count` is kept.
    pub fn reset(&mut self) -> Result<(), IllegalTransition> {
        self.state = self.state.transition(TaskState::New)?;
        self.error_reason = None;
        self.start_timestamp = None;
        self.end_timestamp = None;
        self.reset_baseline = self.error_count;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn errored(policy: &RetryPolicy) -> Task {
        let mut task = Task::new(TaskName::new("extract"), None);
        task.start_attempt(now(), policy).unwrap();
        task.mark_error(now(), "boom".to_string()).unwrap();
        task
    }

    #[test]
    fn success_path_sets_timestamps() {
        let policy = RetryPolicy::new(0);
        let mut task = Task::new(TaskName::new("extract"), None);
        task.start_attempt(now(), &policy).unwrap();
        assert_eq!(task.state, TaskState::Processing);
        assert_eq!(task.start_timestamp, Some(now()));
        assert!(task.end_timestamp.is_none());

        task.mark_completed(now()).unwrap();
        assert_eq!(task.state, TaskState::Completed);
        assert_eq!(task.end_timestamp, Some(now()));
    }

    #[test]
    fn error_increments_count_and_retry_keeps_it() {
        let policy = RetryPolicy::new(1);
        let mut task = errored(&policy);
        assert_eq!(task.error_count, 1);
        assert_eq!(task.error_reason.as_deref(), Some("boom"));
        assert!(task.end_timestamp.is_some());

        task.start_attempt(now(), &policy).unwrap();
        assert_eq!(task.state, TaskState::Processing);
        assert_eq!(task.error_count, 1);
        assert!(task.end_timestamp.is_none());
    }

    #[test]
    fn retry_refused_once_exhausted() {
        let policy = RetryPolicy::new(0);
        let mut task = errored(&policy);
        let err = task.start_attempt(now(), &policy).unwrap_err();
        assert_eq!(err.from, TaskState::Error);
        assert_eq!(task.state, TaskState::Error);
    }

    #[test]
    fn reset_clears_reason_but_keeps_history() {
        let policy = RetryPolicy::new(0);
        let mut task = errored(&policy);
        task.reset().unwrap();
        assert_eq!(task.state, TaskState::New);
        assert!(task.error_reason.is_none());
        assert!(task.end_timestamp.is_none());
        assert_eq!(task.error_count, 1);
        assert_eq!(task.retry_error_count(), 0);

        task.start_attempt(now(), &policy).unwrap();
        task.mark_error(now(), "again".to_string()).unwrap();
        assert_eq!(task.error_count, 2);
    }

    #[test]
    fn completing_a_new_task_is_illegal() {
        let mut task = Task::new(TaskName::new("extract"), None);
        let before = task.clone();
        assert!(task.mark_completed(now()).is_err());
        assert_eq!(task, before);
    }
}
