//! Job-type configuration (read-only for the core).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::errors::JobStateError;
use super::ids::{JobName, TaskName};
use super::retry::RetryPolicy;

/// One step of a job type's pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    pub name: TaskName,
    #[serde(default)]
    pub description: Option<String>,
}

impl TaskConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: TaskName::new(name),
            description: None,
        }
    }
}

/// Template for jobs of one type: ordered tasks plus limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    pub name: JobName,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notify_email: Option<String>,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(default = "default_max_retries_for_error")]
    pub max_retries_for_error: u32,
    #[serde(default)]
    pub max_job_errors: Option<u32>,
    pub tasks: Vec<TaskConfig>,
}

fn default_max_batch_size() -> usize {
    10
}

fn default_max_retries_for_error() -> u32 {
    3
}

impl JobConfig {
    pub fn new<I, S>(name: impl Into<String>, tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: JobName::new(name),
            description: None,
            notify_email: None,
            max_batch_size: default_max_batch_size(),
            max_retries_for_error: default_max_retries_for_error(),
            max_job_errors: None,
            tasks: tasks.into_iter().map(TaskConfig::new).collect(),
        }
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    pub fn with_max_retries_for_error(mut self, max_retries: u32) -> Self {
        self.max_retries_for_error = max_retries;
        self
    }

    pub fn with_max_job_errors(mut self, max_job_errors: u32) -> Self {
        self.max_job_errors = Some(max_job_errors);
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries_for_error: self.max_retries_for_error,
            max_job_errors: self.max_job_errors,
        }
    }

    pub fn validate(&self) -> Result<(), JobStateError> {
        if self.tasks.is_empty() {
            return Err(JobStateError::validation(
                "tasks",
                format!("job type {} has no tasks", self.name),
            ));
        }
        if self.max_batch_size == 0 {
            return Err(JobStateError::validation(
                "maxBatchSize",
                format!("job type {} must allow at least one item per batch", self.name),
            ));
        }
        let mut seen = HashSet::new();
        for task in &self.tasks {
            if !seen.insert(task.name.as_str()) {
                return Err(JobStateError::validation(
                    "tasks",
                    format!("duplicate task {} in job type {}", task.name, self.name),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;

    #[test]
    fn defaults_apply_when_fields_are_missing() {
        let json = r#"{ "name": "ingest", "tasks": [ { "name": "extract" } ] }"#;
        let config: JobConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_batch_size, 10);
        assert_eq!(config.max_retries_for_error, 3);
        assert_eq!(config.max_job_errors, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_and_duplicate_tasks() {
        let empty = JobConfig::new("ingest", Vec::<String>::new());
        assert_eq!(empty.validate().unwrap_err().kind(), ErrorKind::Validation);

        let dup = JobConfig::new("ingest", ["extract", "extract"]);
        assert!(dup.validate().unwrap_err().to_string().contains("duplicate"));

        let zero = JobConfig::new("ingest", ["extract"]).with_max_batch_size(0);
        assert!(zero.validate().is_err());
    }

    #[test]
    fn retry_policy_carries_both_ceilings() {
        let config = JobConfig::new("ingest", ["extract"])
            .with_max_retries_for_error(1)
            .with_max_job_errors(4);
        let policy = config.retry_policy();
        assert_eq!(policy.error_count_ceiling(), 2);
        assert_eq!(policy.max_job_errors, Some(4));
    }
}
