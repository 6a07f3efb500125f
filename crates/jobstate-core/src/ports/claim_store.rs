//! ClaimStore port - job/task の正本（source of truth）
//!
//! # 設計原則
//! - `claim_next_batch` は選択と PROCESSING への更新を一つのロック区間で行う
//!   （二つの呼び出しが同じ record を選ぶことはない）
//! - 失敗時は全体をロールバックする（部分的な claim は残らない）
//! - 単一 record の保存は optimistic version で守る

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Job, JobConfig, JobKey, JobName, JobState, RetryPolicy, TaskState};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists: {0}")]
    AlreadyExists(JobKey),

    #[error("record not found: {0}")]
    NotFound(JobKey),

    #[error("version conflict on {key}: expected {expected}, found {actual}")]
    VersionConflict {
        key: JobKey,
        expected: u64,
        actual: u64,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Selection predicate for one batch claim.
#[derive(Debug, Clone)]
pub struct ClaimQuery {
    pub job_name: JobName,
    /// States of the active task that may be claimed.
    pub candidate_states: Vec<TaskState>,
    pub retry: RetryPolicy,
    pub batch_size: usize,
}

impl ClaimQuery {
    /// NEW or ERROR active tasks, limits from the job type.
    pub fn for_config(config: &JobConfig) -> Self {
        Self {
            job_name: config.name.clone(),
            candidate_states: [
                TaskState::New,
                TaskState::Processing,
                TaskState::Completed,
                TaskState::Error,
            ]
            .into_iter()
            .filter(|state| state.is_claimable())
            .collect(),
            retry: config.retry_policy(),
            batch_size: config.max_batch_size,
        }
    }

    /// Claimable items have an error count strictly below this.
    pub fn error_count_ceiling(&self) -> u32 {
        self.retry.error_count_ceiling()
    }

    /// A READY job of this type whose active task is in a candidate state
    /// and below the ceiling.
    ///
    /// The ceiling applies to errors since the task's last reset
    /// (`Task::retry_error_count`), not to the total `error_count`: a task
    /// reset at `max_retries + 1` errors is claimable again.
    pub fn matches(&self, job: &Job) -> bool {
        if job.deleted || job.job_name != self.job_name || job.state != JobState::Ready {
            return false;
        }
        job.active_task().is_some_and(|task| {
            self.candidate_states.contains(&task.state)
                && task.retry_error_count() < self.error_count_ceiling()
        })
    }
}

/// Read-only listing filter. Deleted jobs never match.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub job_name: Option<JobName>,
    pub state: Option<JobState>,
}

impl JobFilter {
    pub fn matches(&self, job: &Job) -> bool {
        !job.deleted
            && self.job_name.as_ref().is_none_or(|name| &job.job_name == name)
            && self.state.is_none_or(|state| job.state == state)
    }
}

/// The shared transactional record store.
///
/// `version` on `Job` is owned by the store: `insert` stores version 1,
/// every successful write (save or claim) bumps it by one, and the returned
/// `Job` carries the new version.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    /// Insert a new record. Fails with `AlreadyExists` if the identity is
    /// taken, deleted rows included.
    async fn insert(&self, job: Job) -> Result<Job, StoreError>;

    /// Read one record, deleted rows included.
    async fn load(&self, key: &JobKey) -> Result<Option<Job>, StoreError>;

    /// Optimistic save: fails with `VersionConflict` if the stored version is
    /// not `job.version`.
    async fn save(&self, job: &Job) -> Result<Job, StoreError>;

    /// Select up to `query.batch_size` matching records, oldest
    /// `created_timestamp` first, and mark each one's active task Processing
    /// with start time `now`, all under one exclusive lock. On failure nothing
    /// is marked.
    async fn claim_next_batch(
        &self,
        query: &ClaimQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<Job>, StoreError>;

    /// Non-deleted records matching `filter`, in no particular order.
    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, StoreError>;
}
