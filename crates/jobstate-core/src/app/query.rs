//! Read-only job queries: filter and sort.

use std::cmp::Ordering;

use crate::domain::{Job, JobName, JobState, JobStateError};
use crate::ports::JobFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedTimestamp,
    JobId,
    State,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Newest first unless asked otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for JobSort {
    fn default() -> Self {
        Self {
            field: SortField::CreatedTimestamp,
            direction: SortDirection::Desc,
        }
    }
}

impl JobSort {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// Parse `"field"` or `"field,asc|desc"`, e.g. `"jobId,asc"`.
    /// A missing direction keeps the default (descending).
    pub fn parse(param: &str) -> Result<Self, JobStateError> {
        let mut parts = param.splitn(2, ',').map(str::trim);
        let field = match parts.next().unwrap_or_default() {
            "createdTimestamp" => SortField::CreatedTimestamp,
            "jobId" => SortField::JobId,
            "state" => SortField::State,
            other => {
                return Err(JobStateError::validation(
                    "sort",
                    format!("unknown sort field {other:?}"),
                ));
            }
        };
        let direction = match parts.next().map(str::to_ascii_lowercase).as_deref() {
            None => SortDirection::Desc,
            Some("asc") => SortDirection::Asc,
            Some("desc") => SortDirection::Desc,
            Some(other) => {
                return Err(JobStateError::validation(
                    "sort",
                    format!("unknown sort direction {other:?}"),
                ));
            }
        };
        Ok(Self { field, direction })
    }

    fn compare(&self, a: &Job, b: &Job) -> Ordering {
        let primary = match self.field {
            SortField::CreatedTimestamp => a.created_timestamp.cmp(&b.created_timestamp),
            SortField::JobId => a.job_id.cmp(&b.job_id),
            SortField::State => a.state.as_str().cmp(b.state.as_str()),
        };
        let ordered = primary.then_with(|| a.key().cmp(&b.key()));
        match self.direction {
            SortDirection::Asc => ordered,
            SortDirection::Desc => ordered.reverse(),
        }
    }

    pub fn apply(&self, jobs: &mut [Job]) {
        jobs.sort_by(|a, b| self.compare(a, b));
    }
}

/// `getJobs` arguments.
#[derive(Debug, Clone, Default)]
pub struct JobQuery {
    pub job_name: Option<JobName>,
    pub state: Option<JobState>,
    pub sort: JobSort,
}

impl JobQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_name(job_name: JobName) -> Self {
        Self {
            job_name: Some(job_name),
            ..Self::default()
        }
    }

    pub fn with_state(mut self, state: JobState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn sorted_by(mut self, sort: JobSort) -> Self {
        self.sort = sort;
        self
    }

    pub(crate) fn filter(&self) -> JobFilter {
        JobFilter {
            job_name: self.job_name.clone(),
            state: self.state,
        }
    }
}
