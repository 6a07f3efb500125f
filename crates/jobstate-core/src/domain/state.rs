//! Job and task state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Task state.
///
/// State transitions:
/// - New -> Processing -> Completed
/// - New -> Processing -> Error -> Processing (retry, while the retry policy allows)
/// - Error -> New (explicit reset)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Not started, or reset after an error.
    New,

    /// Claimed by a worker.
    Processing,

    /// Finished successfully (terminal).
    Completed,

    /// Last attempt failed.
    Error,
}

impl TaskState {
    /// The transition table. Retry eligibility for `Error -> Processing` is
    /// checked separately by the caller.
    pub fn can_transition_to(self, to: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, to),
            (New, Processing)
                | (Processing, Completed)
                | (Processing, Error)
                | (Error, Processing)
                | (Error, New)
        )
    }

    pub fn transition(self, to: TaskState) -> Result<TaskState, IllegalTransition> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(IllegalTransition { from: self, to })
        }
    }

    /// Can a worker pick this up (subject to retry eligibility)?
    pub fn is_claimable(self) -> bool {
        matches!(self, TaskState::New | TaskState::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::New => "NEW",
            TaskState::Processing => "PROCESSING",
            TaskState::Completed => "COMPLETED",
            TaskState::Error => "ERROR",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job state (derived from the tasks, see `job::derive_job_state`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Submitted, not yet evaluated.
    New,

    /// The active task can be claimed.
    Ready,

    /// The active task is running.
    Processing,

    /// All tasks completed.
    Completed,

    /// The active task failed and will not be retried automatically.
    Error,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::New => "NEW",
            JobState::Ready => "READY",
            JobState::Processing => "PROCESSING",
            JobState::Completed => "COMPLETED",
            JobState::Error => "ERROR",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected task transition. The service attaches job/task context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal task transition {from} -> {to}")]
pub struct IllegalTransition {
    pub from: TaskState,
    pub to: TaskState,
}
