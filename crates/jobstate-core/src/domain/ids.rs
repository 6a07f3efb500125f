//! Domain identifiers (strongly-typed string keys).
//!
//! Jobs are addressed by `(job_name, job_id)` and tasks by their name inside
//! a job. All three are plain strings on the wire, so we use one generic
//! `Key<T>` with a phantom marker to keep them from being mixed up.
//!
//! ## Phantom Type パターン
//! `T` は実行時には使わないマーカー型で、`JobName` と `TaskName` を
//! コンパイル時に区別するためだけに存在します。

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;

use super::errors::JobStateError;

/// KeyMarker は各 key 型のマーカー trait
///
/// `field()` is the name used in validation messages.
pub trait KeyMarker: Send + Sync + 'static {
    fn field() -> &'static str;
}

/// Generic string key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key<T: KeyMarker> {
    value: String,
    _marker: PhantomData<T>,
}

impl<T: KeyMarker> Key<T> {
    /// Build a key from a value already known to be well-formed
    /// (configuration, generated ids, tests).
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    /// Parse caller-supplied input. Blank values and values with surrounding
    /// whitespace are rejected.
    pub fn parse(value: impl Into<String>) -> Result<Self, JobStateError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(JobStateError::validation(T::field(), "must not be blank"));
        }
        if value.trim() != value {
            return Err(JobStateError::validation(
                T::field(),
                "must not have leading or trailing whitespace",
            ));
        }
        Ok(Self::new(value))
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl<T: KeyMarker> fmt::Display for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

impl<T: KeyMarker> Serialize for Key<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value)
    }
}

impl<'de, T: KeyMarker> Deserialize<'de> for Key<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::parse(value).map_err(serde::de::Error::custom)
    }
}

// ========================================
// マーカー型の定義
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobNameKind {}

impl KeyMarker for JobNameKind {
    fn field() -> &'static str {
        "jobName"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobIdKind {}

impl KeyMarker for JobIdKind {
    fn field() -> &'static str {
        "jobId"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskNameKind {}

impl KeyMarker for TaskNameKind {
    fn field() -> &'static str {
        "taskName"
    }
}

/// Logical job-type key (selects a `JobConfig`).
pub type JobName = Key<JobNameKind>;

/// Identifier of a job, unique within its `JobName`.
pub type JobId = Key<JobIdKind>;

/// Name of a task, unique within its job.
pub type TaskName = Key<TaskNameKind>;

/// Full identity of a job record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobKey {
    pub job_name: JobName,
    pub job_id: JobId,
}

impl JobKey {
    pub fn new(job_name: JobName, job_id: JobId) -> Self {
        Self { job_name, job_id }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.job_name, self.job_id)
    }
}
