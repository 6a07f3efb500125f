//! Outcome reported by a worker for a claimed task.

use serde::{Deserialize, Serialize};

use super::state::TaskState;

/// Result of one attempt.
///
/// Serialized as `{"kind":"SUCCESS"}` / `{"kind":"ERROR","reason":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskOutcome {
    Success,
    Error { reason: String },
}

impl TaskOutcome {
    pub fn success() -> Self {
        Self::Success
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self::Error {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// State the task moves to when this outcome is recorded.
    pub fn target_state(&self) -> TaskState {
        match self {
            Self::Success => TaskState::Completed,
            Self::Error { .. } => TaskState::Error,
        }
    }
}
