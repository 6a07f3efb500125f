//! InMemoryJobConfigs - 起動時に読み込んだ job type 設定

use std::collections::BTreeMap;

use crate::domain::{JobConfig, JobName, JobStateError};
use crate::ports::JobConfigSource;

/// Immutable set of job types, validated on construction.
#[derive(Debug, Clone, Default)]
pub struct InMemoryJobConfigs {
    configs: BTreeMap<JobName, JobConfig>,
}

impl InMemoryJobConfigs {
    pub fn new(configs: impl IntoIterator<Item = JobConfig>) -> Result<Self, JobStateError> {
        let mut map = BTreeMap::new();
        for config in configs {
            config.validate()?;
            let name = config.name.clone();
            if map.insert(name.clone(), config).is_some() {
                return Err(JobStateError::validation(
                    "jobName",
                    format!("duplicate job type {name}"),
                ));
            }
        }
        Ok(Self { configs: map })
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

impl JobConfigSource for InMemoryJobConfigs {
    fn job_config(&self, job_name: &JobName) -> Option<JobConfig> {
        self.configs.get(job_name).cloned()
    }

    fn job_names(&self) -> Vec<JobName> {
        self.configs.keys().cloned().collect()
    }
}
