//! Domain model (ids, states, tasks, jobs, sequencing, retry, config, errors).

pub mod config;
pub mod dto;
pub mod errors;
pub mod ids;
pub mod job;
pub mod outcome;
pub mod retry;
pub mod sequencer;
pub mod state;
pub mod task;

pub use config::{JobConfig, TaskConfig};
pub use dto::{JobPatch, JobRequest, JobResponse, TaskResponse};
pub use errors::{ConflictReason, ErrorKind, JobStateError};
pub use ids::{JobId, JobKey, JobName, Key, KeyMarker, TaskName};
pub use job::{Job, derive_job_state};
pub use outcome::TaskOutcome;
pub use retry::{PollBackoff, RetryPolicy, is_retry_eligible};
pub use sequencer::next_task_name;
pub use state::{IllegalTransition, JobState, TaskState};
pub use task::Task;
