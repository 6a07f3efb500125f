//! WorkerLoop - claim → handle → record のループ
//!
//! 各 worker は同じ job type をポーリングする。排他は claim 側で保証されるので
//! worker 同士の調整はない。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::runtime::HandlerRegistry;
use super::service::JobService;
use crate::domain::{ErrorKind, JobName, PollBackoff};

/// How often and how patiently workers poll.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub poll_interval: Duration,
    pub backoff: PollBackoff,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
            backoff: PollBackoff::default(),
        }
    }
}

/// Worker group handle.
/// - handle を drop するとワーカー全体が止まる
/// - `request_shutdown()` で新しい claim を止める（実行中の handler は最後まで走る）
/// - `shutdown_and_join()` で全ワーカーの終了を待てる
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers polling `job_name`.
    pub fn spawn(
        n: usize,
        job_name: JobName,
        service: Arc<JobService>,
        registry: Arc<HandlerRegistry>,
        settings: WorkerSettings,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let worker = Worker {
                id: worker_id,
                job_name: job_name.clone(),
                service: Arc::clone(&service),
                registry: Arc::clone(&registry),
                settings: settings.clone(),
            };
            let mut rx = shutdown_rx.clone();

            joins.push(tokio::spawn(async move {
                worker.run(&mut rx).await;
            }));
        }

        Self { shutdown_tx, joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(e) = join.await {
                error!(error = %e, "worker task panicked");
            }
        }
    }
}

struct Worker {
    id: usize,
    job_name: JobName,
    service: Arc<JobService>,
    registry: Arc<HandlerRegistry>,
    settings: WorkerSettings,
}

impl Worker {
    async fn run(&self, shutdown_rx: &mut watch::Receiver<bool>) {
        info!(worker = self.id, job_name = %self.job_name, "worker started");
        let mut failures: u32 = 0;

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let idle = match self.poll_once().await {
                Ok(0) => {
                    failures = 0;
                    Some(self.settings.poll_interval)
                }
                Ok(_) => {
                    failures = 0;
                    None
                }
                Err(kind) => {
                    failures = failures.saturating_add(1);
                    if kind == ErrorKind::Concurrency {
                        Some(self.settings.backoff.next_delay(failures))
                    } else {
                        Some(self.settings.poll_interval)
                    }
                }
            };

            if let Some(delay) = idle {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        // sender dropped: the group handle is gone
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
        info!(worker = self.id, "worker stopped");
    }

    /// One claim cycle. Returns how many jobs were processed.
    async fn poll_once(&self) -> Result<usize, ErrorKind> {
        let batch = match self.service.get_next_batch(&self.job_name).await {
            Ok(batch) => batch,
            Err(e) if e.kind() == ErrorKind::Concurrency => {
                warn!(worker = self.id, error = %e, "claim failed; backing off");
                return Err(e.kind());
            }
            Err(e) => {
                error!(worker = self.id, error = %e, "claim failed");
                return Err(e.kind());
            }
        };

        let claimed = batch.len();
        for job in batch {
            let Some((task, outcome)) = self.registry.execute(&job).await else {
                continue;
            };
            debug!(
                worker = self.id,
                job = %job.key(),
                task = %task,
                success = outcome.is_success(),
                "task finished"
            );

            if let Err(e) = self
                .service
                .record_result(&job.job_name, &job.job_id, &task, outcome)
                .await
            {
                // the job stays PROCESSING; nothing here can repair it
                error!(
                    worker = self.id,
                    job = %job.key(),
                    task = %task,
                    error = %e,
                    "record_result failed"
                );
            }
        }
        Ok(claimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::app::query::JobQuery;
    use crate::app::runtime::TaskHandler;
    use crate::domain::{Job, JobConfig, JobRequest, JobState, TaskName, TaskOutcome};
    use crate::impls::{InMemoryClaimStore, InMemoryJobConfigs};

    /// Fails the first `fail_first` calls, then succeeds.
    struct Flaky {
        calls: AtomicUsize,
        fail_first: usize,
    }

    #[async_trait]
    impl TaskHandler for Flaky {
        async fn handle(&self, _job: &Job, _task: &TaskName) -> TaskOutcome {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.fail_first {
                TaskOutcome::error("transient")
            } else {
                TaskOutcome::success()
            }
        }
    }

    async fn wait_until_settled(service: &JobService, expected: usize) -> Vec<Job> {
        for _ in 0..400 {
            let jobs = service.get_jobs(&JobQuery::all()).await.unwrap();
            let settled = jobs
                .iter()
                .filter(|j| matches!(j.state, JobState::Completed | JobState::Error))
                .count();
            if settled == expected {
                return jobs;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("jobs did not settle");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn workers_drive_jobs_to_completion() {
        let config = JobConfig::new("ingest", ["extract", "load"])
            .with_max_batch_size(2)
            .with_max_retries_for_error(3);
        let configs = Arc::new(InMemoryJobConfigs::new([config]).unwrap());
        let service = Arc::new(JobService::new(Arc::new(InMemoryClaimStore::new()), configs));

        let name = JobName::new("ingest");
        for _ in 0..6 {
            service.create_job(&name, JobRequest::default()).await.unwrap();
        }

        let mut registry = HandlerRegistry::new();
        registry
            .register(
                TaskName::new("extract"),
                Arc::new(Flaky {
                    calls: AtomicUsize::new(0),
                    fail_first: 3,
                }),
            )
            .unwrap();
        registry
            .register(
                TaskName::new("load"),
                Arc::new(Flaky {
                    calls: AtomicUsize::new(0),
                    fail_first: 0,
                }),
            )
            .unwrap();

        let settings = WorkerSettings {
            poll_interval: Duration::from_millis(5),
            backoff: PollBackoff::default(),
        };
        let group = WorkerGroup::spawn(3, name, Arc::clone(&service), Arc::new(registry), settings);
        assert_eq!(group.len(), 3);

        let jobs = wait_until_settled(&service, 6).await;
        group.shutdown_and_join().await;

        // three transient failures spread over the jobs, all retried
        for job in &jobs {
            assert_eq!(job.state, JobState::Completed, "{} ended {}", job.key(), job.state);
            assert!(job.tasks.iter().all(|t| t.error_count <= 3));
        }
        let errors: u32 = jobs.iter().map(Job::job_error_count).sum();
        assert_eq!(errors, 3);
    }

    #[tokio::test]
    async fn missing_handler_ends_in_error() {
        let config = JobConfig::new("ingest", ["extract"]).with_max_retries_for_error(0);
        let configs = Arc::new(InMemoryJobConfigs::new([config]).unwrap());
        let service = Arc::new(JobService::new(Arc::new(InMemoryClaimStore::new()), configs));
        let name = JobName::new("ingest");
        service.create_job(&name, JobRequest::default()).await.unwrap();

        let settings = WorkerSettings {
            poll_interval: Duration::from_millis(5),
            backoff: PollBackoff::default(),
        };
        let group = WorkerGroup::spawn(
            1,
            name,
            Arc::clone(&service),
            Arc::new(HandlerRegistry::new()),
            settings,
        );
        let jobs = wait_until_settled(&service, 1).await;
        group.shutdown_and_join().await;

        assert_eq!(jobs[0].state, JobState::Error);
        let task = &jobs[0].tasks[0];
        assert_eq!(task.error_count, 1);
        assert!(task.error_reason.as_deref().unwrap_or_default().contains("no handler"));
    }
}
