//! JobConfigSource port - job type 設定の読み取り専用ソース

use crate::domain::{JobConfig, JobName};

/// Per job type: ordered tasks, batch size and retry limits.
///
/// The core only reads from this; it never writes configuration.
pub trait JobConfigSource: Send + Sync {
    fn job_config(&self, job_name: &JobName) -> Option<JobConfig>;

    fn job_names(&self) -> Vec<JobName>;

    fn exists(&self, job_name: &JobName) -> bool {
        self.job_config(job_name).is_some()
    }
}
