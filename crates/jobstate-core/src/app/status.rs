//! Status views - job state ごとの件数

use serde::{Deserialize, Serialize};

use crate::domain::{Job, JobState};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub new: usize,
    pub ready: usize,
    pub processing: usize,
    pub completed: usize,
    pub error: usize,
}

impl JobCounts {
    pub fn tally<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> Self {
        let mut counts = Self::default();
        for job in jobs {
            match job.state {
                JobState::New => counts.new += 1,
                JobState::Ready => counts.ready += 1,
                JobState::Processing => counts.processing += 1,
                JobState::Completed => counts.completed += 1,
                JobState::Error => counts.error += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.new + self.ready + self.processing + self.completed + self.error
    }

    /// Nothing left for workers to pick up or finish.
    pub fn is_settled(&self) -> bool {
        self.new == 0 && self.ready == 0 && self.processing == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::domain::{JobConfig, JobId};

    #[test]
    fn tally_counts_each_state() {
        let config = JobConfig::new("ingest", ["extract"]);
        let mut jobs: Vec<Job> = (0..3)
            .map(|i| Job::from_config(&config, JobId::new(format!("{i}")), None, Utc::now()))
            .collect();
        jobs[0].state = JobState::Completed;
        jobs[1].state = JobState::Error;

        let counts = JobCounts::tally(&jobs);
        assert_eq!(counts.ready, 1);
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.error, 1);
        assert_eq!(counts.total(), 3);
        assert!(!counts.is_settled());

        assert!(JobCounts::tally(&jobs[..2]).is_settled());
    }
}
