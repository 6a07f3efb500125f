//! JobService - job ライフサイクルの窓口
//!
//! # 操作
//! - create_job: 設定から job を作る（READY で保存）
//! - get_next_batch: 実行可能な job を排他的に claim する
//! - record_result: 実行結果を記録し job state を再計算
//! - reset_job / reset_task: ERROR からの手動復旧
//! - patch_job: description の更新（管理用）
//! - delete_job / get_job / get_jobs: 管理系
//!
//! 状態の変更はすべて ClaimStore の version 付き save を通る。

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::query::JobQuery;
use crate::domain::{
    IllegalTransition, Job, JobConfig, JobId, JobKey, JobName, JobPatch, JobRequest, JobState,
    JobStateError, TaskName, TaskOutcome, TaskState,
};
use crate::ports::{
    ClaimQuery, ClaimStore, Clock, IdGenerator, JobConfigSource, SystemClock, UlidGenerator,
};

pub struct JobService {
    store: Arc<dyn ClaimStore>,
    configs: Arc<dyn JobConfigSource>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl JobService {
    /// System clock and ULID job ids.
    pub fn new(store: Arc<dyn ClaimStore>, configs: Arc<dyn JobConfigSource>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        Self {
            store,
            configs,
            clock,
            ids,
        }
    }

    /// Replace the clock. The default id generator follows the new clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.ids = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    fn config(&self, job_name: &JobName) -> Result<JobConfig, JobStateError> {
        self.configs
            .job_config(job_name)
            .ok_or_else(|| JobStateError::ConfigNotFound(job_name.clone()))
    }

    /// Load a job that exists and is not deleted.
    async fn load_live(
        &self,
        operation: &'static str,
        key: &JobKey,
    ) -> Result<Job, JobStateError> {
        let job = self
            .store
            .load(key)
            .await
            .map_err(|e| JobStateError::from_store(operation, key, e))?;
        match job {
            Some(job) if !job.deleted => Ok(job),
            _ => Err(JobStateError::JobNotFound(key.clone())),
        }
    }

    async fn save(&self, operation: &'static str, job: &Job) -> Result<Job, JobStateError> {
        self.store
            .save(job)
            .await
            .map_err(|e| JobStateError::from_store(operation, &job.key(), e))
    }

    /// Create a job of type `job_name`. Tasks come from the type's config,
    /// in order, all NEW; the job is stored READY.
    ///
    /// Without a `jobId` in the request one is generated.
    pub async fn create_job(
        &self,
        job_name: &JobName,
        request: JobRequest,
    ) -> Result<Job, JobStateError> {
        let config = self.config(job_name)?;
        let job_id = match request.parsed_job_id()? {
            Some(job_id) => job_id,
            None => self.ids.generate_job_id(),
        };

        let job = Job::from_config(&config, job_id, request.description, self.clock.now());
        let key = job.key();
        let job = self
            .store
            .insert(job)
            .await
            .map_err(|e| JobStateError::from_store("create_job", &key, e))?;

        info!(
            job = %key,
            tasks = job.tasks.len(),
            state = %job.state,
            "job created"
        );
        Ok(job)
    }

    /// Claim up to `max_batch_size` claimable jobs of this type, oldest first.
    ///
    /// Each returned job has its active task PROCESSING. Two concurrent calls
    /// never return the same job. An empty batch is a normal result.
    pub async fn get_next_batch(&self, job_name: &JobName) -> Result<Vec<Job>, JobStateError> {
        let config = self.config(job_name)?;
        let query = ClaimQuery::for_config(&config);

        let batch = self
            .store
            .claim_next_batch(&query, self.clock.now())
            .await
            .map_err(|source| JobStateError::Concurrency {
                operation: "get_next_batch",
                source,
            })?;

        debug!(
            job_name = %job_name,
            batch_size = query.batch_size,
            found = batch.len(),
            "next batch claimed"
        );
        Ok(batch)
    }

    /// Record the outcome of a PROCESSING task and re-derive the job state.
    ///
    /// A task in any other state is rejected and left untouched.
    pub async fn record_result(
        &self,
        job_name: &JobName,
        job_id: &JobId,
        task_name: &TaskName,
        outcome: TaskOutcome,
    ) -> Result<Job, JobStateError> {
        let config = self.config(job_name)?;
        let policy = config.retry_policy();
        let key = JobKey::new(job_name.clone(), job_id.clone());
        let mut job = self.load_live("record_result", &key).await?;
        let now = self.clock.now();

        let task = job
            .task_mut(task_name)
            .ok_or_else(|| JobStateError::TaskNotFound {
                job: key.clone(),
                task: task_name.clone(),
            })?;
        let applied = match outcome {
            TaskOutcome::Success => task.mark_completed(now),
            TaskOutcome::Error { reason } => task.mark_error(now, reason),
        };
        applied.map_err(|e| illegal_task(&key, task_name, e))?;
        let error_count = task.error_count;
        let task_state = task.state;

        job.refresh(&policy);
        let job = self.save("record_result", &job).await?;

        if job.state == JobState::Error {
            warn!(
                job = %key,
                task = %task_name,
                error_count,
                "job in ERROR; retries exhausted, needs reset"
            );
        } else {
            info!(
                job = %key,
                task = %task_name,
                task_state = %task_state,
                job_state = %job.state,
                "task result recorded"
            );
        }
        Ok(job)
    }

    /// Manual recovery of a job whose active task is in ERROR, whether the
    /// job is terminally ERROR or still READY for a retry.
    ///
    /// The active task goes back to NEW and the whole job gets a fresh retry
    /// budget: errors recorded so far stop counting against the task and job
    /// ceilings. Error counts are kept for audit.
    pub async fn reset_job(
        &self,
        job_name: &JobName,
        job_id: &JobId,
    ) -> Result<Job, JobStateError> {
        let config = self.config(job_name)?;
        let key = JobKey::new(job_name.clone(), job_id.clone());
        let mut job = self.load_live("reset_job", &key).await?;

        let task_name = match job.active_task() {
            Some(task) if job.state == JobState::Error || task.state == TaskState::Error => {
                task.name.clone()
            }
            _ => {
                return Err(JobStateError::IllegalJobTransition {
                    job: key,
                    from: job.state,
                    attempted: "reset",
                });
            }
        };

        job.restart_error_budget();
        self.reset_in_place(&mut job, &key, &task_name, &config)?;
        let job = self.save("reset_job", &job).await?;
        info!(job = %key, task = %task_name, state = %job.state, "job reset");
        Ok(job)
    }

    /// Reset one task from ERROR to NEW.
    pub async fn reset_task(
        &self,
        job_name: &JobName,
        job_id: &JobId,
        task_name: &TaskName,
    ) -> Result<Job, JobStateError> {
        let config = self.config(job_name)?;
        let key = JobKey::new(job_name.clone(), job_id.clone());
        let mut job = self.load_live("reset_task", &key).await?;

        self.reset_in_place(&mut job, &key, task_name, &config)?;
        let job = self.save("reset_task", &job).await?;
        info!(job = %key, task = %task_name, state = %job.state, "task reset");
        Ok(job)
    }

    fn reset_in_place(
        &self,
        job: &mut Job,
        key: &JobKey,
        task_name: &TaskName,
        config: &JobConfig,
    ) -> Result<(), JobStateError> {
        let task = job
            .task_mut(task_name)
            .ok_or_else(|| JobStateError::TaskNotFound {
                job: key.clone(),
                task: task_name.clone(),
            })?;
        task.reset().map_err(|e| illegal_task(key, task_name, e))?;
        job.refresh(&config.retry_policy());
        Ok(())
    }

    /// Admin update of caller-owned fields. State is never touched here.
    pub async fn patch_job(
        &self,
        job_name: &JobName,
        job_id: &JobId,
        patch: JobPatch,
    ) -> Result<Job, JobStateError> {
        let key = JobKey::new(job_name.clone(), job_id.clone());
        let mut job = self.load_live("patch_job", &key).await?;
        if !patch.apply(&mut job) {
            debug!(job = %key, "patch_job: nothing to change");
            return Ok(job);
        }
        let job = self.save("patch_job", &job).await?;
        info!(job = %key, "job patched");
        Ok(job)
    }

    /// Logical delete. Deleted jobs are never claimed and never listed.
    pub async fn delete_job(&self, job_name: &JobName, job_id: &JobId) -> Result<(), JobStateError> {
        let key = JobKey::new(job_name.clone(), job_id.clone());
        let mut job = self.load_live("delete_job", &key).await?;
        job.mark_deleted();
        self.save("delete_job", &job).await?;
        info!(job = %key, "job deleted");
        Ok(())
    }

    pub async fn get_job(&self, job_name: &JobName, job_id: &JobId) -> Result<Job, JobStateError> {
        let key = JobKey::new(job_name.clone(), job_id.clone());
        self.load_live("get_job", &key).await
    }

    pub async fn get_jobs(&self, query: &JobQuery) -> Result<Vec<Job>, JobStateError> {
        let mut jobs = self
            .store
            .list(&query.filter())
            .await
            .map_err(|source| JobStateError::Concurrency {
                operation: "get_jobs",
                source,
            })?;
        query.sort.apply(&mut jobs);
        Ok(jobs)
    }
}

fn illegal_task(job: &JobKey, task: &TaskName, err: IllegalTransition) -> JobStateError {
    JobStateError::IllegalTaskTransition {
        job: job.clone(),
        task: task.clone(),
        from: err.from,
        to: err.to,
    }
}
