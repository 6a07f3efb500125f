//! Request / response shapes and the explicit mapping to and from the domain.
//!
//! Fields the caller may not set directly: `jobName` (taken from the route),
//! `state`, `nextTaskName`, `createdTimestamp`, task timestamps, task error
//! fields, `deleted` and `version`. `JobRequest` rejects them as unknown
//! fields instead of silently ignoring them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::JobStateError;
use super::ids::JobId;
use super::job::Job;
use super::state::{JobState, TaskState};
use super::task::Task;

/// Body of a job-creation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JobRequest {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl JobRequest {
    pub fn with_job_id(job_id: impl Into<String>) -> Self {
        Self {
            job_id: Some(job_id.into()),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn from_json(body: &str) -> Result<Self, JobStateError> {
        serde_json::from_str(body).map_err(|e| JobStateError::validation("body", e.to_string()))
    }

    /// The requested job id, validated. `None` means the core derives one.
    pub fn parsed_job_id(&self) -> Result<Option<JobId>, JobStateError> {
        self.job_id.as_deref().map(|id| JobId::parse(id)).transpose()
    }
}

/// Body of an admin patch. Present fields replace the stored value, absent
/// ones are left as they are; only `description` is patchable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JobPatch {
    #[serde(default)]
    pub description: Option<String>,
}

impl JobPatch {
    pub fn with_description(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
        }
    }

    pub fn from_json(body: &str) -> Result<Self, JobStateError> {
        serde_json::from_str(body).map_err(|e| JobStateError::validation("body", e.to_string()))
    }

    /// Apply to `job`. Returns whether anything changed.
    pub fn apply(self, job: &mut Job) -> bool {
        match self.description {
            Some(description) if job.description.as_deref() != Some(description.as_str()) => {
                job.description = Some(description);
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub name: String,
    pub description: Option<String>,
    pub state: TaskState,
    pub start_timestamp: Option<DateTime<Utc>>,
    pub end_timestamp: Option<DateTime<Utc>>,
    pub error_reason: Option<String>,
    pub error_count: u32,
}

impl From<&Task> for TaskResponse {
    fn from(task: &Task) -> Self {
        Self {
            name: task.name.to_string(),
            description: task.description.clone(),
            state: task.state,
            start_timestamp: task.start_timestamp,
            end_timestamp: task.end_timestamp,
            error_reason: task.error_reason.clone(),
            error_count: task.error_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub job_name: String,
    pub job_id: String,
    pub description: Option<String>,
    pub created_timestamp: DateTime<Utc>,
    pub state: JobState,
    pub next_task_name: Option<String>,
    pub tasks: Vec<TaskResponse>,
}

impl From<&Job> for JobResponse {
    fn from(job: &Job) -> Self {
        Self {
            job_name: job.job_name.to_string(),
            job_id: job.job_id.to_string(),
            description: job.description.clone(),
            created_timestamp: job.created_timestamp,
            state: job.state,
            next_task_name: job.next_task_name.as_ref().map(ToString::to_string),
            tasks: job.tasks.iter().map(TaskResponse::from).collect(),
        }
    }
}
