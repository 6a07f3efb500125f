//! Errors - エラー型と分類

use thiserror::Error;

use super::ids::{JobKey, JobName, TaskName};
use super::state::{JobState, TaskState};
use crate::ports::StoreError;

/// ErrorKind は失敗の分類
///
/// - Validation: caller's fault, never retried automatically
/// - NotFound: job / task / config does not exist
/// - IllegalStateTransition: protocol error by the caller
/// - Conflict: version mismatch or duplicate identity; retry with fresh state
/// - Concurrency: the store failed under lock; retry on the next poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    IllegalStateTransition,
    Conflict,
    Concurrency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// A job with this identity already exists (deleted rows included).
    Duplicate,
    /// Someone else saved the record between our read and our write.
    VersionMismatch { expected: u64, actual: u64 },
}

#[derive(Debug, Error)]
pub enum JobStateError {
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("job config not found: jobName={0}")]
    ConfigNotFound(JobName),

    #[error("job not found: {0}")]
    JobNotFound(JobKey),

    #[error("task not found: job={job}, task={task}")]
    TaskNotFound { job: JobKey, task: TaskName },

    #[error("illegal state transition: job={job}, task={task}, {from} -> {to}")]
    IllegalTaskTransition {
        job: JobKey,
        task: TaskName,
        from: TaskState,
        to: TaskState,
    },

    #[error("illegal state transition: job={job} is {from}, cannot {attempted}")]
    IllegalJobTransition {
        job: JobKey,
        from: JobState,
        attempted: &'static str,
    },

    #[error("conflict on job={job}: {reason:?}")]
    Conflict { job: JobKey, reason: ConflictReason },

    #[error("concurrency failure during {operation}: {source}")]
    Concurrency {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

impl JobStateError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::ConfigNotFound(_) | Self::JobNotFound(_) | Self::TaskNotFound { .. } => {
                ErrorKind::NotFound
            }
            Self::IllegalTaskTransition { .. } | Self::IllegalJobTransition { .. } => {
                ErrorKind::IllegalStateTransition
            }
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Concurrency { .. } => ErrorKind::Concurrency,
        }
    }

    /// Map a store failure for a single-record operation on `job`.
    pub(crate) fn from_store(operation: &'static str, job: &JobKey, err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists(key) => Self::Conflict {
                job: key,
                reason: ConflictReason::Duplicate,
            },
            StoreError::VersionConflict {
                key,
                expected,
                actual,
            } => Self::Conflict {
                job: key,
                reason: ConflictReason::VersionMismatch { expected, actual },
            },
            StoreError::NotFound(_) => Self::JobNotFound(job.clone()),
            source @ StoreError::Unavailable(_) => Self::Concurrency { operation, source },
        }
    }
}
