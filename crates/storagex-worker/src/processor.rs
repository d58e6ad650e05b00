//! Drives one job through `pending -> processing -> {completed, failed}`.
//!
//! Every status change is persisted before its notification is sent, so a
//! client never sees a status the store does not hold.

use std::sync::Arc;

use storagex_db::JobStore;
use storagex_models::{Job, JobId, JobStatus, NotificationEvent};
use storagex_queue::TranscodeJob;

use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::logging::JobLogger;
use crate::metrics;
use crate::notifier::Notifier;
use crate::retry::{retry_async, RetryConfig, RetryResult};
use crate::transcoder::Transcoder;

/// What to do with the queue message once processing returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Acknowledge the message.
    Ack,
    /// Copy the message to the dead-letter stream, then acknowledge it.
    DeadLetter(String),
    /// Leave the message pending so it is redelivered after the claim idle time.
    Abandon,
}

pub struct JobProcessor {
    store: Arc<dyn JobStore>,
    notifier: Arc<dyn Notifier>,
    transcoder: Transcoder,
    retry: RetryConfig,
    delete_source: bool,
}

impl JobProcessor {
    pub fn new(
        store: Arc<dyn JobStore>,
        notifier: Arc<dyn Notifier>,
        transcoder: Transcoder,
        config: &WorkerConfig,
    ) -> Self {
        let retry = RetryConfig::new("transcode")
            .with_max_retries(config.max_retries)
            .with_base_delay(config.retry_base_delay);
        Self {
            store,
            notifier,
            transcoder,
            retry,
            delete_source: config.delete_source,
        }
    }

    /// Process one delivery of `request`.
    ///
    /// Safe to call again for the same job: terminal jobs are only
    /// re-announced, and a job found in `processing` resumes without
    /// persisting that status again.
    pub async fn process(&self, request: &TranscodeJob) -> Disposition {
        let logger = JobLogger::new(&request.job_id, "transcode");

        let mut job = match self.store.get_job(&request.job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                logger.log_warning("job not found, dropping message");
                return Disposition::Ack;
            }
            Err(e) => {
                logger.log_error(&format!("job store unavailable: {}", e));
                return Disposition::Abandon;
            }
        };

        if job.is_terminal() {
            logger.log_progress(&format!("already {}, acknowledging redelivery", job.status));
            self.notify(&job, &logger).await;
            return Disposition::Ack;
        }

        if job.status == JobStatus::Pending {
            if let Err(e) = job.start_processing() {
                logger.log_error(&e.to_string());
                return Disposition::Ack;
            }
            if let Err(e) = self.store.update_job(&job).await {
                logger.log_error(&format!("failed to persist processing: {}", e));
                return Disposition::Abandon;
            }
        } else {
            logger.log_progress("resuming job left in processing");
        }
        self.notify(&job, &logger).await;

        logger.log_start(&format!("{} at {}", request.source_key, request.resolution));
        let result = retry_async(&self.retry, WorkerError::is_retryable, || {
            self.transcoder.transcode(&job, request)
        })
        .await;

        match result {
            RetryResult::Success(key) => self.finish_completed(job, request, key, &logger).await,
            RetryResult::Failed { error, attempts } => {
                self.finish_failed(job, error, attempts, &logger).await
            }
        }
    }

    /// Fail a job without transcoding it: its message exceeded the delivery
    /// budget or could not be decoded.
    ///
    /// `cause` labels the failure metric. Returns `Ack` once the job is
    /// terminal, `Abandon` when the store could not be updated.
    pub async fn give_up(&self, job_id: &JobId, reason: &str, cause: &'static str) -> Disposition {
        let logger = JobLogger::new(job_id, "transcode");
        logger.log_error(&format!("giving up: {}", reason));

        let mut job = match self.store.get_job(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => return Disposition::Ack,
            Err(e) => {
                logger.log_error(&format!("job store unavailable: {}", e));
                return Disposition::Abandon;
            }
        };
        if job.is_terminal() {
            return Disposition::Ack;
        }

        if job.status == JobStatus::Pending {
            if let Err(e) = job.start_processing() {
                logger.log_error(&e.to_string());
                return Disposition::Ack;
            }
        }
        if let Err(e) = job.fail() {
            logger.log_error(&e.to_string());
            return Disposition::Ack;
        }
        if let Err(e) = self.store.update_job(&job).await {
            logger.log_error(&format!("failed to persist failure: {}", e));
            return Disposition::Abandon;
        }
        self.notify(&job, &logger).await;
        metrics::record_job_failed(cause);
        Disposition::Ack
    }

    async fn finish_completed(
        &self,
        mut job: Job,
        request: &TranscodeJob,
        key: String,
        logger: &JobLogger,
    ) -> Disposition {
        if let Err(e) = job.complete(key) {
            logger.log_error(&e.to_string());
            return Disposition::Ack;
        }
        if let Err(e) = self.store.update_job(&job).await {
            logger.log_error(&format!("failed to persist completion: {}", e));
            return Disposition::Abandon;
        }
        self.notify(&job, logger).await;
        metrics::record_job_completed(request.resolution.as_str());

        if self.delete_source {
            if let Err(e) = self.transcoder.delete_source(&request.source_key).await {
                logger.log_warning(&format!("failed to delete source object: {}", e));
            }
        }
        logger.log_completion(job.s3_key.as_deref().unwrap_or_default());
        Disposition::Ack
    }

    async fn finish_failed(
        &self,
        mut job: Job,
        error: WorkerError,
        attempts: u32,
        logger: &JobLogger,
    ) -> Disposition {
        logger.log_error(&format!(
            "transcode failed after {} attempt(s): {}",
            attempts, error
        ));
        let retries_exhausted = error.is_retryable() && self.retry.max_retries > 0;

        if let Err(e) = job.fail() {
            logger.log_error(&e.to_string());
            return Disposition::Ack;
        }
        if let Err(e) = self.store.update_job(&job).await {
            logger.log_error(&format!("failed to persist failure: {}", e));
            return Disposition::Abandon;
        }
        self.notify(&job, logger).await;

        if retries_exhausted {
            metrics::record_job_failed("retries_exhausted");
            Disposition::DeadLetter(error.to_string())
        } else {
            metrics::record_job_failed("transcode");
            Disposition::Ack
        }
    }

    async fn notify(&self, job: &Job, logger: &JobLogger) {
        let event = NotificationEvent::for_job(job);
        if let Err(e) = self.notifier.notify(&event).await {
            logger.log_warning(&format!("notification not delivered: {}", e));
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use storagex_db::InMemoryJobStore;
    use storagex_media::{Encoder, MediaError, MediaResult};
    use storagex_models::{keys, Resolution};
    use storagex_storage::InMemoryObjectStore;

    use crate::error::WorkerResult;

    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        events: Mutex<Vec<NotificationEvent>>,
    }

    impl RecordingNotifier {
        pub(crate) fn statuses(&self) -> Vec<String> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.status.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, event: &NotificationEvent) -> WorkerResult<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    /// Writes a small output file, after failing with the queued errors.
    #[derive(Default)]
    pub(crate) struct FakeEncoder {
        failures: Mutex<VecDeque<MediaError>>,
        calls: AtomicU32,
    }

    impl FakeEncoder {
        pub(crate) fn failing(failures: Vec<MediaError>) -> Self {
            Self {
                failures: Mutex::new(failures.into()),
                calls: AtomicU32::new(0),
            }
        }

        pub(crate) fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Encoder for FakeEncoder {
        async fn encode(&self, _input: &Path, output: &Path, _r: Resolution) -> MediaResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let failure = self.failures.lock().unwrap().pop_front();
            if let Some(e) = failure {
                return Err(e);
            }
            tokio::fs::write(output, b"encoded").await?;
            Ok(())
        }
    }

    pub(crate) struct Harness {
        pub store: Arc<InMemoryJobStore>,
        pub objects: Arc<InMemoryObjectStore>,
        pub notifier: Arc<RecordingNotifier>,
        pub encoder: Arc<FakeEncoder>,
        pub config: WorkerConfig,
        _work_dir: tempfile::TempDir,
    }

    impl Harness {
        pub(crate) fn new(max_retries: u32, failures: Vec<MediaError>) -> Self {
            let work_dir = tempfile::tempdir().unwrap();
            let config = WorkerConfig {
                max_retries,
                retry_base_delay: Duration::from_millis(1),
                work_dir: work_dir.path().to_string_lossy().into_owned(),
                ..WorkerConfig::default()
            };
            Self {
                store: Arc::new(InMemoryJobStore::new()),
                objects: Arc::new(InMemoryObjectStore::new()),
                notifier: Arc::new(RecordingNotifier::default()),
                encoder: Arc::new(FakeEncoder::failing(failures)),
                config,
                _work_dir: work_dir,
            }
        }

        pub(crate) fn processor(&self) -> JobProcessor {
            let transcoder = Transcoder::new(
                self.objects.clone(),
                self.encoder.clone(),
                &self.config.raw_bucket,
                &self.config.processed_bucket,
                self.config.scratch_root(),
            );
            JobProcessor::new(
                self.store.clone(),
                self.notifier.clone(),
                transcoder,
                &self.config,
            )
        }

        /// Admit job `id` owned by user 42 with its raw upload in place.
        pub(crate) async fn admit(&self, id: &str) -> TranscodeJob {
            let job = Job::new(JobId::from(id), 42i64, "clip.mov", 7);
            self.store.insert_job(&job).await.unwrap();
            let raw = keys::raw_key(&job.owner_id, &job.id, &job.filename);
            self.objects
                .insert(&self.config.raw_bucket, &raw, b"raw".to_vec())
                .await;
            TranscodeJob::new(job.id, raw)
        }

        pub(crate) async fn job(&self, id: &str) -> Job {
            self.store.get_job(&JobId::from(id)).await.unwrap().unwrap()
        }

        /// Entries left in this worker's scratch directory.
        pub(crate) fn scratch_entries(&self) -> usize {
            match std::fs::read_dir(self.config.scratch_root()) {
                Ok(entries) => entries.count(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
                Err(e) => panic!("unreadable scratch root: {}", e),
            }
        }
    }

    fn permanent() -> MediaError {
        MediaError::ffmpeg_failed("Invalid data found when processing input", None, Some(1))
    }

    #[tokio::test]
    async fn test_successful_transcode_completes_job() {
        let h = Harness::new(0, vec![]);
        let request = h.admit("j1").await;

        assert_eq!(h.processor().process(&request).await, Disposition::Ack);

        let job = h.job("j1").await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.s3_key.as_deref(), Some("processed/user_42/j1.mp4"));
        assert!(job.processed_at.is_some());
        assert_eq!(
            h.objects.get("processed-videos", "processed/user_42/j1.mp4").await,
            Some(b"encoded".to_vec())
        );
        assert!(!h.objects.contains("raw-videos", &request.source_key).await);
        assert_eq!(h.notifier.statuses(), vec!["processing", "completed"]);
    }

    #[tokio::test]
    async fn test_encoder_failure_fails_job() {
        let h = Harness::new(0, vec![permanent()]);
        let request = h.admit("j1").await;

        assert_eq!(h.processor().process(&request).await, Disposition::Ack);

        let job = h.job("j1").await;
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.s3_key.is_none());
        assert!(!h.objects.contains("processed-videos", "processed/user_42/j1.mp4").await);
        assert_eq!(h.notifier.statuses(), vec!["processing", "failed"]);
    }

    #[tokio::test]
    async fn test_redelivery_of_completed_job_changes_nothing() {
        let h = Harness::new(0, vec![]);
        let request = h.admit("j1").await;
        let processor = h.processor();

        processor.process(&request).await;
        let updates = h.store.update_count();
        let first = h.job("j1").await;

        assert_eq!(processor.process(&request).await, Disposition::Ack);
        assert_eq!(h.store.update_count(), updates);
        assert_eq!(h.encoder.calls(), 1);
        assert_eq!(h.job("j1").await, first);
        assert_eq!(h.notifier.statuses().last().map(String::as_str), Some("completed"));
    }

    #[tokio::test]
    async fn test_job_left_processing_resumes() {
        let h = Harness::new(0, vec![]);
        let request = h.admit("j1").await;
        let mut job = h.job("j1").await;
        job.start_processing().unwrap();
        h.store.update_job(&job).await.unwrap();
        let updates = h.store.update_count();

        assert_eq!(h.processor().process(&request).await, Disposition::Ack);
        assert_eq!(h.job("j1").await.status, JobStatus::Completed);
        assert_eq!(h.store.update_count(), updates + 1);
    }

    #[tokio::test]
    async fn test_unknown_job_is_dropped() {
        let h = Harness::new(0, vec![]);
        let request = TranscodeJob::new(JobId::from("ghost"), "raw/user_1/ghost-a.mp4");

        assert_eq!(h.processor().process(&request).await, Disposition::Ack);
        assert_eq!(h.encoder.calls(), 0);
        assert!(h.notifier.statuses().is_empty());
    }

    #[tokio::test]
    async fn test_store_outage_leaves_message_pending() {
        let h = Harness::new(0, vec![]);
        let request = h.admit("j1").await;
        h.store.set_unavailable(true);

        assert_eq!(h.processor().process(&request).await, Disposition::Abandon);
        assert_eq!(h.encoder.calls(), 0);
        assert!(h.notifier.statuses().is_empty());
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let h = Harness::new(2, vec![MediaError::Timeout(1), MediaError::Timeout(1)]);
        let request = h.admit("j1").await;

        assert_eq!(h.processor().process(&request).await, Disposition::Ack);
        assert_eq!(h.encoder.calls(), 3);
        assert_eq!(h.job("j1").await.status, JobStatus::Completed);
        assert_eq!(h.notifier.statuses(), vec!["processing", "completed"]);
    }

    #[tokio::test]
    async fn test_exhausted_retries_dead_letter() {
        let h = Harness::new(1, vec![MediaError::Timeout(1), MediaError::Timeout(1)]);
        let request = h.admit("j1").await;

        let disposition = h.processor().process(&request).await;
        assert!(matches!(disposition, Disposition::DeadLetter(_)));
        assert_eq!(h.encoder.calls(), 2);
        assert_eq!(h.job("j1").await.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let h = Harness::new(3, vec![permanent()]);
        let request = h.admit("j1").await;

        assert_eq!(h.processor().process(&request).await, Disposition::Ack);
        assert_eq!(h.encoder.calls(), 1);
        assert_eq!(h.job("j1").await.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_missing_source_fails_without_encoding() {
        let h = Harness::new(3, vec![]);
        let job = Job::new(JobId::from("j1"), 42i64, "clip.mov", 7);
        h.store.insert_job(&job).await.unwrap();
        let request = TranscodeJob::new(job.id, "raw/user_42/j1-clip.mov");

        assert_eq!(h.processor().process(&request).await, Disposition::Ack);
        assert_eq!(h.encoder.calls(), 0);
        assert_eq!(h.job("j1").await.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_give_up_fails_pending_job() {
        let h = Harness::new(0, vec![]);
        let request = h.admit("j1").await;

        let disposition = h
            .processor()
            .give_up(&request.job_id, "too many deliveries", "max_deliveries")
            .await;
        assert_eq!(disposition, Disposition::Ack);
        assert_eq!(h.job("j1").await.status, JobStatus::Failed);
        assert_eq!(h.notifier.statuses(), vec!["failed"]);
    }

    #[tokio::test]
    async fn test_scratch_removed_on_every_exit_path() {
        let h = Harness::new(0, vec![]);
        let request = h.admit("j1").await;
        h.processor().process(&request).await;
        assert_eq!(h.job("j1").await.status, JobStatus::Completed);
        assert_eq!(h.scratch_entries(), 0);

        let h = Harness::new(0, vec![permanent()]);
        let request = h.admit("j2").await;
        h.processor().process(&request).await;
        assert_eq!(h.job("j2").await.status, JobStatus::Failed);
        assert_eq!(h.scratch_entries(), 0);

        let h = Harness::new(0, vec![]);
        h.objects.set_fail_uploads(true);
        let request = h.admit("j3").await;
        h.processor().process(&request).await;
        assert_eq!(h.encoder.calls(), 1);
        assert_eq!(h.job("j3").await.status, JobStatus::Failed);
        assert_eq!(h.scratch_entries(), 0);
    }

    #[tokio::test]
    async fn test_unpersisted_processing_is_not_announced() {
        let h = Harness::new(0, vec![]);
        let request = h.admit("j1").await;
        h.store.fail_updates_after(0);

        assert_eq!(h.processor().process(&request).await, Disposition::Abandon);
        assert_eq!(h.job("j1").await.status, JobStatus::Pending);
        assert_eq!(h.encoder.calls(), 0);
        assert!(h.notifier.statuses().is_empty());
    }

    #[tokio::test]
    async fn test_unpersisted_completion_is_not_announced() {
        let h = Harness::new(0, vec![]);
        let request = h.admit("j1").await;
        h.store.fail_updates_after(1);

        assert_eq!(h.processor().process(&request).await, Disposition::Abandon);
        assert_eq!(h.job("j1").await.status, JobStatus::Processing);
        assert_eq!(h.notifier.statuses(), vec!["processing"]);
        assert_eq!(h.scratch_entries(), 0);
    }
}
