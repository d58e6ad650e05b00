//! Job store abstraction.

use async_trait::async_trait;

use storagex_models::{Job, JobId, Summary};

use crate::error::DbResult;

/// Durable record of jobs and their summaries.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Get a job by ID.
    async fn get_job(&self, id: &JobId) -> DbResult<Option<Job>>;

    /// Insert a newly admitted job.
    async fn insert_job(&self, job: &Job) -> DbResult<()>;

    /// Persist status, `s3_key` and `processed_at` of an existing job.
    async fn update_job(&self, job: &Job) -> DbResult<()>;

    /// Get the stored summary of a job.
    async fn get_summary(&self, video_id: &JobId) -> DbResult<Option<Summary>>;

    /// Store a summary, replacing any existing one for the same job.
    async fn save_summary(&self, summary: &Summary) -> DbResult<()>;

    /// Delete the summary of a job. Returns whether one existed.
    async fn delete_summary(&self, video_id: &JobId) -> DbResult<bool>;

    /// Check that the store is reachable.
    async fn ping(&self) -> DbResult<()>;
}
