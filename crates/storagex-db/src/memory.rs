//! In-memory job store for tests/dev.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::RwLock;

use storagex_models::{Job, JobId, Summary};

use crate::error::{DbError, DbResult};
use crate::store::JobStore;

#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    summaries: RwLock<HashMap<JobId, Vec<Summary>>>,
    updates: AtomicUsize,
    update_limit: Mutex<Option<usize>>,
    unavailable: AtomicBool,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `update_job` calls that succeeded.
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Number of stored summary rows for a job.
    pub async fn summary_rows(&self, video_id: &JobId) -> usize {
        self.summaries
            .read()
            .await
            .get(video_id)
            .map_or(0, Vec::len)
    }

    /// Simulate an outage: every call fails until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Let `limit` more `update_job` calls succeed, then fail the rest.
    pub fn fail_updates_after(&self, limit: usize) {
        let done = self.update_count();
        if let Ok(mut slot) = self.update_limit.lock() {
            *slot = Some(done + limit);
        }
    }

    fn check(&self) -> DbResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DbError::Unavailable("store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn get_job(&self, id: &JobId) -> DbResult<Option<Job>> {
        self.check()?;
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn insert_job(&self, job: &Job) -> DbResult<()> {
        self.check()?;
        self.jobs.write().await.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn update_job(&self, job: &Job) -> DbResult<()> {
        self.check()?;
        let limit = self.update_limit.lock().ok().and_then(|slot| *slot);
        if limit.is_some_and(|limit| self.update_count() >= limit) {
            return Err(DbError::Unavailable("update rejected".to_string()));
        }
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job.id) {
            Some(stored) => {
                *stored = job.clone();
                self.updates.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            None => Err(DbError::NotFound(job.id.to_string())),
        }
    }

    async fn get_summary(&self, video_id: &JobId) -> DbResult<Option<Summary>> {
        self.check()?;
        Ok(self
            .summaries
            .read()
            .await
            .get(video_id)
            .and_then(|rows| rows.last().cloned()))
    }

    async fn save_summary(&self, summary: &Summary) -> DbResult<()> {
        self.check()?;
        self.summaries
            .write()
            .await
            .insert(summary.video_id.clone(), vec![summary.clone()]);
        Ok(())
    }

    async fn delete_summary(&self, video_id: &JobId) -> DbResult<bool> {
        self.check()?;
        Ok(self.summaries.write().await.remove(video_id).is_some())
    }

    async fn ping(&self) -> DbResult<()> {
        self.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_update_requires_existing_job() {
        let store = InMemoryJobStore::new();
        let mut job = Job::new(JobId::from("j1"), "u1", "a.mp4", 10);

        assert!(matches!(
            store.update_job(&job).await,
            Err(DbError::NotFound(_))
        ));

        store.insert_job(&job).await.unwrap();
        job.start_processing().unwrap();
        store.update_job(&job).await.unwrap();

        let loaded = store.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, storagex_models::JobStatus::Processing);
        assert_eq!(store.update_count(), 1);
    }

    #[tokio::test]
    async fn test_fail_updates_after() {
        let store = InMemoryJobStore::new();
        let mut job = Job::new(JobId::from("j1"), 42i64, "clip.mov", 7);
        store.insert_job(&job).await.unwrap();
        store.fail_updates_after(1);

        job.start_processing().unwrap();
        store.update_job(&job).await.unwrap();
        job.fail().unwrap();
        assert!(store.update_job(&job).await.is_err());
        assert_eq!(store.get_job(&job.id).await.unwrap().unwrap().status.as_str(), "processing");
    }

    #[tokio::test]
    async fn test_save_summary_keeps_single_row() {
        let store = InMemoryJobStore::new();
        let id = JobId::from("j1");

        store.save_summary(&Summary::new(id.clone(), "first")).await.unwrap();
        store.save_summary(&Summary::new(id.clone(), "second")).await.unwrap();

        assert_eq!(store.summary_rows(&id).await, 1);
        assert_eq!(store.get_summary(&id).await.unwrap().unwrap().text, "second");
        assert!(store.delete_summary(&id).await.unwrap());
        assert!(!store.delete_summary(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_unavailable_store_errors() {
        let store = InMemoryJobStore::new();
        store.set_unavailable(true);
        assert!(store.get_job(&JobId::from("j1")).await.is_err());
        store.set_unavailable(false);
        assert!(store.get_job(&JobId::from("j1")).await.unwrap().is_none());
    }
}
