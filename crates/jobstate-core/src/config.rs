//! Service configuration (TOML).
//!
//! ```toml
//! [worker]
//! workers = 2
//! poll_interval_ms = 200
//!
//! [[job]]
//! name = "ingest"
//! max_batch_size = 10
//! max_retries_for_error = 3
//! tasks = [{ name = "extract" }, { name = "load" }]
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::app::WorkerSettings;
use crate::domain::{JobConfig, JobStateError, PollBackoff};
use crate::impls::InMemoryJobConfigs;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing TOML config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<JobStateError> for ConfigError {
    fn from(err: JobStateError) -> Self {
        Self::Invalid(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

fn default_workers() -> usize {
    2
}

fn default_poll_interval_ms() -> u64 {
    200
}

fn default_backoff_base_ms() -> u64 {
    100
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_backoff_max_ms() -> u64 {
    5_000
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            poll_interval_ms: default_poll_interval_ms(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

impl WorkerConfig {
    pub fn poll_backoff(&self) -> PollBackoff {
        PollBackoff::new(
            Duration::from_millis(self.backoff_base_ms),
            self.backoff_multiplier,
            Duration::from_millis(self.backoff_max_ms),
        )
    }

    pub fn settings(&self) -> WorkerSettings {
        WorkerSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            backoff: self.poll_backoff(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(rename = "job", default)]
    pub jobs: Vec<JobConfig>,
}

impl ServiceConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jobs.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one [[job]] is required".to_string(),
            ));
        }
        if self.worker.workers == 0 {
            return Err(ConfigError::Invalid("worker.workers must be >= 1".to_string()));
        }
        let multiplier = self.worker.backoff_multiplier;
        if multiplier.is_nan() || multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "worker.backoff_multiplier must be >= 1.0".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for job in &self.jobs {
            job.validate()?;
            if !seen.insert(&job.name) {
                return Err(ConfigError::Invalid(format!(
                    "job type {} is defined twice",
                    job.name
                )));
            }
        }
        Ok(())
    }

    /// Freeze the job types into a read-only config source.
    pub fn job_configs(&self) -> Result<InMemoryJobConfigs, ConfigError> {
        Ok(InMemoryJobConfigs::new(self.jobs.iter().cloned())?)
    }
}

/// Read, parse and validate a config file.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ServiceConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ServiceConfig::from_toml_str(&contents)
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("jobstate.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobName;
    use crate::ports::JobConfigSource;

    const SAMPLE: &str = r#"
[worker]
workers = 4
poll_interval_ms = 50

[[job]]
name = "ingest"
description = "nightly ingest"
notify_email = "ops@example.com"
max_batch_size = 5
max_retries_for_error = 1
tasks = [
    { name = "extract", description = "pull rows" },
    { name = "transform" },
    { name = "load" },
]

[[job]]
name = "export"
tasks = [{ name = "dump" }]
"#;

    #[test]
    fn parses_sample_with_defaults() {
        let config = ServiceConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.worker.workers, 4);
        assert_eq!(config.worker.poll_interval_ms, 50);
        assert_eq!(config.worker.backoff_max_ms, 5_000);
        assert_eq!(config.jobs.len(), 2);

        let ingest = &config.jobs[0];
        assert_eq!(ingest.max_batch_size, 5);
        assert_eq!(ingest.max_retries_for_error, 1);
        assert_eq!(ingest.notify_email.as_deref(), Some("ops@example.com"));
        assert_eq!(ingest.tasks[0].description.as_deref(), Some("pull rows"));

        let export = &config.jobs[1];
        assert_eq!(export.max_batch_size, 10);
        assert_eq!(export.max_retries_for_error, 3);
        assert_eq!(export.max_job_errors, None);

        let source = config.job_configs().unwrap();
        assert!(source.exists(&JobName::new("export")));
    }

    #[test]
    fn worker_settings_follow_config() {
        let config = ServiceConfig::from_toml_str(SAMPLE).unwrap();
        let settings = config.worker.settings();
        assert_eq!(settings.poll_interval, Duration::from_millis(50));
        assert_eq!(settings.backoff.next_delay(1).as_millis(), 100);
        assert_eq!(settings.backoff.next_delay(3).as_millis(), 400);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ServiceConfig::from_toml_str(
            r#"
[[job]]
name = "ingest"
retries = 3
tasks = [{ name = "extract" }]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn semantic_validation() {
        let cases = [
            ("", "at least one"),
            (
                "[worker]\nworkers = 0\n[[job]]\nname = \"a\"\ntasks = [{ name = \"t\" }]",
                "workers",
            ),
            (
                "[worker]\nbackoff_multiplier = 0.5\n[[job]]\nname = \"a\"\ntasks = [{ name = \"t\" }]",
                "backoff_multiplier",
            ),
            (
                "[[job]]\nname = \"a\"\ntasks = [{ name = \"t\" }]\n[[job]]\nname = \"a\"\ntasks = [{ name = \"u\" }]",
                "defined twice",
            ),
            ("[[job]]\nname = \"a\"\ntasks = []", "invalid"),
            (
                "[[job]]\nname = \"a\"\nmax_batch_size = 0\ntasks = [{ name = \"t\" }]",
                "invalid",
            ),
        ];
        for (toml, needle) in cases {
            let err = ServiceConfig::from_toml_str(toml).unwrap_err();
            assert!(
                err.to_string().contains(needle),
                "{toml:?}: {err} should mention {needle}"
            );
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_from_path("/nonexistent/jobstate.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
