//! Cache-aside summarization pipeline.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::future::join_all;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use storagex_cache::{SummaryCache, DEFAULT_SUMMARY_TTL};
use storagex_db::JobStore;
use storagex_media::{FrameSampler, SampledFrame, ScratchDir, DEFAULT_FRAME_TIMEOUT};
use storagex_ml_client::InferenceClient;
use storagex_models::{
    summary_cache_key, JobId, JobStatus, Summary, ANALYSIS_FALLBACK, SYNTHESIS_FALLBACK,
    VIDEO_NOT_READY,
};
use storagex_storage::ObjectStore;

use crate::error::SummaryResult;
use crate::prompts::{synthesis_prompt, VISION_PROMPT};

/// Relative positions of the sampled frames.
pub const SAMPLE_FRACTIONS: [f64; 3] = [0.2, 0.5, 0.8];

#[derive(Debug, Clone)]
pub struct SummaryConfig {
    /// Bucket holding transcoded output
    pub processed_bucket: String,
    /// Root for per-summary scratch directories
    pub work_dir: PathBuf,
    /// Cache entry lifetime
    pub cache_ttl: Duration,
    /// Bound on each ffprobe/ffmpeg run while sampling frames
    pub frame_timeout: Duration,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            processed_bucket: "processed-videos".to_string(),
            work_dir: std::env::temp_dir().join("storagex-summary"),
            cache_ttl: DEFAULT_SUMMARY_TTL,
            frame_timeout: DEFAULT_FRAME_TIMEOUT,
        }
    }
}

impl SummaryConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            processed_bucket: std::env::var("S3_PROCESSED_BUCKET")
                .unwrap_or(defaults.processed_bucket),
            work_dir: std::env::var("SUMMARY_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            cache_ttl: std::env::var("SUMMARY_CACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            frame_timeout: std::env::var("SUMMARY_FRAME_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.frame_timeout),
        }
    }
}

/// Produces, stores and caches one summary per job.
pub struct SummaryPipeline {
    store: Arc<dyn JobStore>,
    cache: Arc<dyn SummaryCache>,
    objects: Arc<dyn ObjectStore>,
    sampler: Arc<dyn FrameSampler>,
    inference: Arc<dyn InferenceClient>,
    config: SummaryConfig,
}

impl SummaryPipeline {
    pub fn new(
        store: Arc<dyn JobStore>,
        cache: Arc<dyn SummaryCache>,
        objects: Arc<dyn ObjectStore>,
        sampler: Arc<dyn FrameSampler>,
        inference: Arc<dyn InferenceClient>,
        config: SummaryConfig,
    ) -> Self {
        Self {
            store,
            cache,
            objects,
            sampler,
            inference,
            config,
        }
    }

    /// Summary text for a job.
    ///
    /// Without `force` an existing summary is returned from the cache or the
    /// store. With `force` the stored summary is discarded and rebuilt.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn summarize(&self, job_id: &JobId, force: bool) -> SummaryResult<String> {
        let cache_key = summary_cache_key(job_id);

        if force {
            info!("Force regenerating summary");
            self.store.delete_summary(job_id).await?;
            self.cache.delete(&cache_key).await;
        } else {
            if let Some(text) = self.cache.get(&cache_key).await {
                debug!("Summary served from cache");
                return Ok(text);
            }
            if let Some(summary) = self.store.get_summary(job_id).await? {
                debug!("Summary served from store, backfilling cache");
                self.cache
                    .set(&cache_key, &summary.text, self.config.cache_ttl)
                    .await;
                return Ok(summary.text);
            }
        }

        let job = match self.store.get_job(job_id).await? {
            Some(job) if job.status == JobStatus::Completed => job,
            _ => return Ok(VIDEO_NOT_READY.to_string()),
        };
        let Some(s3_key) = job.s3_key else {
            return Ok(VIDEO_NOT_READY.to_string());
        };

        let text = match self.sample(job_id, &s3_key).await {
            Some(frames) => {
                let descriptions = self.describe(&frames).await;
                let text = match self.inference.complete(&synthesis_prompt(&descriptions)).await {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Synthesis failed: {}", e);
                        SYNTHESIS_FALLBACK.to_string()
                    }
                };
                info!("Summary generated from {} frames", frames.len());
                text
            }
            // Stored like any other result so a forced rebuild never leaves
            // the job without a summary row.
            None => ANALYSIS_FALLBACK.to_string(),
        };

        self.store
            .save_summary(&Summary::new(job_id.clone(), text.clone()))
            .await?;
        self.cache
            .set(&cache_key, &text, self.config.cache_ttl)
            .await;

        Ok(text)
    }

    /// Download the processed output and sample frames from it.
    ///
    /// `None` means nothing usable could be read.
    async fn sample(&self, job_id: &JobId, s3_key: &str) -> Option<Vec<SampledFrame>> {
        // Overlapping requests for one job each get their own directory.
        let name = format!("summary-{}-{}", job_id, Uuid::new_v4().simple());
        let scratch = match ScratchDir::create(&self.config.work_dir, &name).await {
            Ok(dir) => dir,
            Err(e) => {
                warn!("Failed to create scratch dir: {}", e);
                return None;
            }
        };
        let video = scratch.join("video.mp4");

        if let Err(e) = self
            .objects
            .download_file(&self.config.processed_bucket, s3_key, &video)
            .await
        {
            warn!("Failed to download processed video: {}", e);
            return None;
        }

        let frames = match self.sampler.sample(&video, &SAMPLE_FRACTIONS).await {
            Ok(frames) => frames,
            Err(e) => {
                warn!("Frame sampling failed: {}", e);
                Vec::new()
            }
        };

        if let Err(e) = scratch.remove().await {
            warn!("Failed to remove scratch dir: {}", e);
        }

        if frames.is_empty() {
            warn!("No frame could be sampled");
            return None;
        }
        Some(frames)
    }

    /// Describe every frame concurrently; results stay in frame order.
    async fn describe(&self, frames: &[SampledFrame]) -> Vec<String> {
        let calls = frames.iter().map(|frame| async move {
            let image = BASE64.encode(&frame.jpeg);
            match self.inference.describe_frame(VISION_PROMPT, &image).await {
                Ok(desc) => desc,
                Err(e) => {
                    warn!(fraction = frame.fraction, "Vision call failed: {}", e);
                    String::new()
                }
            }
        });
        join_all(calls).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use mockall::predicate::eq;
    use storagex_cache::InMemorySummaryCache;
    use storagex_db::InMemoryJobStore;
    use storagex_media::{MediaError, MediaResult};
    use storagex_ml_client::{MlError, MockInferenceClient};
    use storagex_models::Job;
    use storagex_storage::InMemoryObjectStore;

    const PROCESSED_KEY: &str = "processed/user_u1/j1.mp4";

    /// Returns one frame per fraction except the listed failures.
    struct FakeSampler {
        unreadable: Vec<f64>,
    }

    #[async_trait]
    impl FrameSampler for FakeSampler {
        async fn sample(&self, video: &Path, fractions: &[f64]) -> MediaResult<Vec<SampledFrame>> {
            if !video.exists() {
                return Err(MediaError::FileNotFound(video.to_path_buf()));
            }
            Ok(fractions
                .iter()
                .enumerate()
                .filter(|(_, f)| !self.unreadable.contains(f))
                .map(|(i, &fraction)| SampledFrame {
                    fraction,
                    index: i as u64,
                    jpeg: vec![i as u8; 4],
                })
                .collect())
        }
    }

    /// Holds the first caller inside sampling while a second call runs.
    struct SlowFirstSampler {
        calls: AtomicU32,
    }

    #[async_trait]
    impl FrameSampler for SlowFirstSampler {
        async fn sample(&self, video: &Path, fractions: &[f64]) -> MediaResult<Vec<SampledFrame>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            FakeSampler { unreadable: vec![] }.sample(video, fractions).await
        }
    }

    struct Harness {
        store: Arc<InMemoryJobStore>,
        cache: Arc<InMemorySummaryCache>,
        pipeline: SummaryPipeline,
        work: tempfile::TempDir,
    }

    async fn harness(inference: MockInferenceClient, unreadable: Vec<f64>) -> Harness {
        let store = Arc::new(InMemoryJobStore::new());
        let cache = Arc::new(InMemorySummaryCache::new());
        let objects = Arc::new(InMemoryObjectStore::new());
        let work = tempfile::tempdir().unwrap();

        let mut job = Job::new(JobId::from("j1"), "u1", "clip.mp4", 10);
        job.start_processing().unwrap();
        job.complete(PROCESSED_KEY).unwrap();
        store.insert_job(&job).await.unwrap();
        objects
            .insert("processed-videos", PROCESSED_KEY, b"mp4".to_vec())
            .await;

        let pipeline = SummaryPipeline::new(
            store.clone(),
            cache.clone(),
            objects,
            Arc::new(FakeSampler { unreadable }),
            Arc::new(inference),
            SummaryConfig {
                work_dir: work.path().to_path_buf(),
                ..SummaryConfig::default()
            },
        );

        Harness {
            store,
            cache,
            pipeline,
            work,
        }
    }

    fn describing(inference: &mut MockInferenceClient, times: usize) {
        inference
            .expect_describe_frame()
            .with(eq(VISION_PROMPT), mockall::predicate::always())
            .times(times)
            .returning(|_, _| Ok("a code editor".to_string()));
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let mut inference = MockInferenceClient::new();
        describing(&mut inference, 3);
        inference
            .expect_complete()
            .times(1)
            .returning(|_| Ok("A technical video.".to_string()));

        let h = harness(inference, vec![]).await;
        let id = JobId::from("j1");

        let first = h.pipeline.summarize(&id, false).await.unwrap();
        let second = h.pipeline.summarize(&id, false).await.unwrap();

        assert_eq!(first, "A technical video.");
        assert_eq!(second, first);
        assert_eq!(h.store.summary_rows(&id).await, 1);
        assert_eq!(
            h.cache.get("summary:j1").await.as_deref(),
            Some("A technical video.")
        );
    }

    #[tokio::test]
    async fn test_unreadable_frames_skip_inference() {
        // No expectations: any inference call fails the test.
        let inference = MockInferenceClient::new();
        let h = harness(inference, SAMPLE_FRACTIONS.to_vec()).await;
        let id = JobId::from("j1");

        let text = h.pipeline.summarize(&id, false).await.unwrap();

        assert_eq!(text, ANALYSIS_FALLBACK);
        assert_eq!(h.store.summary_rows(&id).await, 1);
        assert_eq!(
            h.cache.get("summary:j1").await.as_deref(),
            Some(ANALYSIS_FALLBACK)
        );
    }

    #[tokio::test]
    async fn test_force_with_unreadable_frames_keeps_one_row() {
        let inference = MockInferenceClient::new();
        let h = harness(inference, SAMPLE_FRACTIONS.to_vec()).await;
        let id = JobId::from("j1");
        h.store
            .save_summary(&Summary::new(id.clone(), "old"))
            .await
            .unwrap();

        let text = h.pipeline.summarize(&id, true).await.unwrap();

        assert_eq!(text, ANALYSIS_FALLBACK);
        assert_eq!(h.store.summary_rows(&id).await, 1);
        assert_eq!(
            h.store.get_summary(&id).await.unwrap().unwrap().text,
            ANALYSIS_FALLBACK
        );
    }

    #[tokio::test]
    async fn test_overlapping_requests_do_not_share_scratch() {
        let mut inference = MockInferenceClient::new();
        describing(&mut inference, 6);
        inference
            .expect_complete()
            .times(2)
            .returning(|_| Ok("real summary".to_string()));

        let mut h = harness(inference, vec![]).await;
        h.pipeline.sampler = Arc::new(SlowFirstSampler {
            calls: AtomicU32::new(0),
        });
        let id = JobId::from("j1");

        let (first, second) = tokio::join!(
            h.pipeline.summarize(&id, false),
            h.pipeline.summarize(&id, false)
        );

        assert_eq!(first.unwrap(), "real summary");
        assert_eq!(second.unwrap(), "real summary");
        assert_eq!(h.store.summary_rows(&id).await, 1);
        assert_eq!(std::fs::read_dir(h.work.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_failed_vision_call_leaves_empty_description() {
        let mut inference = MockInferenceClient::new();
        let mut calls = 0;
        inference
            .expect_describe_frame()
            .times(2)
            .returning(move |_, _| {
                calls += 1;
                if calls == 1 {
                    Ok("a terminal".to_string())
                } else {
                    Err(MlError::Timeout(30))
                }
            });
        inference
            .expect_complete()
            .withf(|prompt: &str| prompt.contains("- Frame 1: a terminal\n- Frame 2: \n"))
            .times(1)
            .returning(|_| Ok("summary".to_string()));

        // The middle offset cannot be decoded.
        let h = harness(inference, vec![0.5]).await;
        let text = h.pipeline.summarize(&JobId::from("j1"), false).await.unwrap();
        assert_eq!(text, "summary");
    }

    #[tokio::test]
    async fn test_synthesis_failure_is_persisted_as_fallback() {
        let mut inference = MockInferenceClient::new();
        describing(&mut inference, 3);
        inference
            .expect_complete()
            .times(1)
            .returning(|_| Err(MlError::Unavailable("down".to_string())));

        let h = harness(inference, vec![]).await;
        let id = JobId::from("j1");
        let text = h.pipeline.summarize(&id, false).await.unwrap();

        assert_eq!(text, SYNTHESIS_FALLBACK);
        assert_eq!(
            h.store.get_summary(&id).await.unwrap().unwrap().text,
            SYNTHESIS_FALLBACK
        );
    }

    #[tokio::test]
    async fn test_force_replaces_existing_summary() {
        let mut inference = MockInferenceClient::new();
        describing(&mut inference, 3);
        inference
            .expect_complete()
            .times(1)
            .returning(|_| Ok("fresh".to_string()));

        let h = harness(inference, vec![]).await;
        let id = JobId::from("j1");
        h.store
            .save_summary(&Summary::new(id.clone(), "stale"))
            .await
            .unwrap();
        h.cache
            .set("summary:j1", "stale", Duration::from_secs(60))
            .await;

        let text = h.pipeline.summarize(&id, true).await.unwrap();

        assert_eq!(text, "fresh");
        assert_eq!(h.store.summary_rows(&id).await, 1);
        assert_eq!(h.store.get_summary(&id).await.unwrap().unwrap().text, "fresh");
        assert_eq!(h.cache.get("summary:j1").await.as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_store_hit_backfills_cache() {
        let inference = MockInferenceClient::new();
        let h = harness(inference, vec![]).await;
        let id = JobId::from("j1");
        h.store
            .save_summary(&Summary::new(id.clone(), "stored"))
            .await
            .unwrap();

        let text = h.pipeline.summarize(&id, false).await.unwrap();

        assert_eq!(text, "stored");
        assert_eq!(h.cache.get("summary:j1").await.as_deref(), Some("stored"));
    }

    #[tokio::test]
    async fn test_job_not_completed_is_not_ready() {
        let inference = MockInferenceClient::new();
        let h = harness(inference, vec![]).await;
        let pending = Job::new(JobId::from("j2"), "u1", "b.mp4", 10);
        h.store.insert_job(&pending).await.unwrap();

        let text = h.pipeline.summarize(&pending.id, false).await.unwrap();
        assert_eq!(text, VIDEO_NOT_READY);

        let text = h.pipeline.summarize(&JobId::from("missing"), false).await.unwrap();
        assert_eq!(text, VIDEO_NOT_READY);
        assert_eq!(h.store.summary_rows(&pending.id).await, 0);
    }

    #[tokio::test]
    async fn test_cache_outage_falls_back_to_store() {
        let inference = MockInferenceClient::new();
        let h = harness(inference, vec![]).await;
        let id = JobId::from("j1");
        h.store
            .save_summary(&Summary::new(id.clone(), "stored"))
            .await
            .unwrap();
        h.cache.set_offline(true);

        assert_eq!(h.pipeline.summarize(&id, false).await.unwrap(), "stored");
    }
}
