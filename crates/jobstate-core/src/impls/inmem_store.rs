//! InMemoryClaimStore - 開発用・テスト用の正本
//!
//! # 実装詳細
//! - BTreeMap<JobKey, Job> を一つの tokio Mutex で保護（table lock）
//! - claim は lock を握ったまま選択 → 更新を staging し、最後にまとめて commit
//! - staging 中に失敗したら何も書き戻さない（rollback）

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{Job, JobKey};
use crate::ports::{ClaimQuery, ClaimStore, JobFilter, StoreError};

pub struct InMemoryClaimStore {
    rows: Mutex<BTreeMap<JobKey, Job>>,
    /// Test hook: abort the next claim after staging this many rows.
    #[cfg(test)]
    fail_claim_after: std::sync::Mutex<Option<usize>>,
}

impl InMemoryClaimStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(BTreeMap::new()),
            #[cfg(test)]
            fail_claim_after: std::sync::Mutex::new(None),
        }
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn fail_next_claim_after(&self, staged: usize) {
        *self.fail_claim_after.lock().unwrap() = Some(staged);
    }

    #[cfg(test)]
    fn injected_fault(&self, staged: usize) -> Result<(), StoreError> {
        let mut fault = self.fail_claim_after.lock().unwrap();
        if *fault == Some(staged) {
            *fault = None;
            return Err(StoreError::Unavailable("injected claim fault".to_string()));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn injected_fault(&self, _staged: usize) -> Result<(), StoreError> {
        Ok(())
    }
}

impl Default for InMemoryClaimStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClaimStore for InMemoryClaimStore {
    async fn insert(&self, mut job: Job) -> Result<Job, StoreError> {
        let mut rows = self.rows.lock().await;
        let key = job.key();
        if rows.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key));
        }
        job.version = 1;
        rows.insert(key, job.clone());
        Ok(job)
    }

    async fn load(&self, key: &JobKey) -> Result<Option<Job>, StoreError> {
        let rows = self.rows.lock().await;
        Ok(rows.get(key).cloned())
    }

    async fn save(&self, job: &Job) -> Result<Job, StoreError> {
        let mut rows = self.rows.lock().await;
        let key = job.key();
        let stored = rows
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        if stored.version != job.version {
            return Err(StoreError::VersionConflict {
                key,
                expected: job.version,
                actual: stored.version,
            });
        }
        let mut next = job.clone();
        next.version += 1;
        *stored = next.clone();
        Ok(next)
    }

    async fn claim_next_batch(
        &self,
        query: &ClaimQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<Job>, StoreError> {
        if query.batch_size == 0 {
            return Ok(Vec::new());
        }

        // Held until commit: no other claim or save can interleave.
        let mut rows = self.rows.lock().await;

        let mut candidates: Vec<&Job> = rows.values().filter(|job| query.matches(job)).collect();
        candidates.sort_by(|a, b| {
            a.created_timestamp
                .cmp(&b.created_timestamp)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        candidates.truncate(query.batch_size);

        let mut staged = Vec::with_capacity(candidates.len());
        for job in candidates {
            self.injected_fault(staged.len())?;
            let mut next = job.clone();
            next.begin_active_task(now, &query.retry).map_err(|e| {
                StoreError::Unavailable(format!("claim of {} rejected: {e}", job.key()))
            })?;
            next.version += 1;
            staged.push(next);
        }

        for job in &staged {
            rows.insert(job.key(), job.clone());
        }
        Ok(staged)
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, StoreError> {
        let rows = self.rows.lock().await;
        Ok(rows.values().filter(|job| filter.matches(job)).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    use chrono::{Duration, TimeZone};

    use crate::domain::{JobConfig, JobId, JobState, TaskState};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn config() -> JobConfig {
        JobConfig::new("ingest", ["extract", "load"])
            .with_max_batch_size(3)
            .with_max_retries_for_error(1)
    }

    async fn seeded(n: usize) -> InMemoryClaimStore {
        let store = InMemoryClaimStore::new();
        // insert newest first so map order differs from age order
        for i in (0..n).rev() {
            let created = t0() + Duration::seconds(i as i64);
            let job = Job::from_config(&config(), JobId::new(format!("job-{i:02}")), None, created);
            store.insert(job).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_identity() {
        let store = seeded(1).await;
        let dup = Job::from_config(&config(), JobId::new("job-00"), None, t0());
        let err = store.insert(dup).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn save_checks_version() {
        let store = seeded(1).await;
        let key = Job::from_config(&config(), JobId::new("job-00"), None, t0()).key();
        let loaded = store.load(&key).await.unwrap().unwrap();
        assert_eq!(loaded.version, 1);

        let mut first = loaded.clone();
        first.description = Some("first".into());
        let saved = store.save(&first).await.unwrap();
        assert_eq!(saved.version, 2);

        let mut stale = loaded;
        stale.description = Some("stale".into());
        let err = store.save(&stale).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::VersionConflict {
                key: key.clone(),
                expected: 1,
                actual: 2
            }
        );
        let current = store.load(&key).await.unwrap().unwrap();
        assert_eq!(current.description.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn claim_takes_oldest_first_and_marks_processing() {
        let store = seeded(5).await;
        let query = ClaimQuery::for_config(&config());
        let now = t0() + Duration::hours(1);

        let batch = store.claim_next_batch(&query, now).await.unwrap();
        let ids: Vec<_> = batch.iter().map(|j| j.job_id.to_string()).collect();
        assert_eq!(ids, ["job-00", "job-01", "job-02"]);

        for job in &batch {
            assert_eq!(job.state, JobState::Processing);
            assert_eq!(job.version, 2);
            let task = job.active_task().unwrap();
            assert_eq!(task.state, TaskState::Processing);
            assert_eq!(task.start_timestamp, Some(now));
        }

        let batch = store.claim_next_batch(&query, now).await.unwrap();
        let ids: Vec<_> = batch.iter().map(|j| j.job_id.to_string()).collect();
        assert_eq!(ids, ["job-03", "job-04"]);

        assert!(store.claim_next_batch(&query, now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_claim_rolls_back_every_mark() {
        let store = seeded(3).await;
        let query = ClaimQuery::for_config(&config());
        store.fail_next_claim_after(2);

        let err = store.claim_next_batch(&query, t0()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        let rows = store.list(&JobFilter::default()).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|j| j.state == JobState::Ready && j.version == 1));

        // the hook fires once; the next poll succeeds
        assert_eq!(store.claim_next_batch(&query, t0()).await.unwrap().len(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_never_overlap() {
        let store = Arc::new(seeded(40).await);
        let query = ClaimQuery::for_config(&config());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            let query = query.clone();
            handles.push(tokio::spawn(async move {
                store.claim_next_batch(&query, t0()).await.unwrap()
            }));
        }

        let mut seen = HashSet::new();
        let mut total = 0;
        for handle in handles {
            for job in handle.await.unwrap() {
                total += 1;
                assert!(seen.insert(job.key()), "{} claimed twice", job.key());
            }
        }
        assert_eq!(total, 40);
        assert_eq!(seen.len(), 40);
    }

    #[tokio::test]
    async fn list_skips_deleted_rows() {
        let store = seeded(2).await;
        let key = Job::from_config(&config(), JobId::new("job-00"), None, t0()).key();
        let mut job = store.load(&key).await.unwrap().unwrap();
        job.mark_deleted();
        store.save(&job).await.unwrap();

        let rows = store.list(&JobFilter::default()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(store.len().await, 2);
        assert!(store.load(&key).await.unwrap().unwrap().deleted);
    }
}
