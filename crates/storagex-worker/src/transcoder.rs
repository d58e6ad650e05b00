//! Download, encode and upload of one job.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use storagex_media::{Encoder, ScratchDir};
use storagex_models::{keys, Job};
use storagex_queue::TranscodeJob;
use storagex_storage::ObjectStore;

use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::metrics;

const OUTPUT_CONTENT_TYPE: &str = "video/mp4";

/// Runs the media half of a job inside a per-job scratch directory.
pub struct Transcoder {
    objects: Arc<dyn ObjectStore>,
    encoder: Arc<dyn Encoder>,
    raw_bucket: String,
    processed_bucket: String,
    work_dir: PathBuf,
}

impl Transcoder {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        encoder: Arc<dyn Encoder>,
        raw_bucket: impl Into<String>,
        processed_bucket: impl Into<String>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            objects,
            encoder,
            raw_bucket: raw_bucket.into(),
            processed_bucket: processed_bucket.into(),
            work_dir: work_dir.into(),
        }
    }

    /// Transcode `request.source_key` and upload the result.
    ///
    /// Returns the processed object key. The output key depends only on the
    /// job, so a repeated run overwrites the same object.
    pub async fn transcode(&self, job: &Job, request: &TranscodeJob) -> WorkerResult<String> {
        let logger = JobLogger::new(&job.id, "transcode");
        let started = Instant::now();
        let scratch = ScratchDir::create(&self.work_dir, job.id.as_str()).await?;

        let input = scratch.join("input");
        let output = scratch.join(&format!("output.{}", keys::PROCESSED_EXTENSION));

        self.objects
            .download_file(&self.raw_bucket, &request.source_key, &input)
            .await?;
        logger.log_progress(&format!("downloaded {}", request.source_key));

        let encode_started = Instant::now();
        self.encoder
            .encode(&input, &output, request.resolution)
            .await?;
        metrics::record_encode_duration(
            request.resolution.as_str(),
            encode_started.elapsed().as_secs_f64(),
        );

        let key = keys::processed_key(&job.owner_id, &job.id);
        self.objects
            .upload_file(&self.processed_bucket, &key, &output, OUTPUT_CONTENT_TYPE)
            .await?;
        logger.log_progress(&format!("uploaded {}", key));

        if let Err(e) = scratch.remove().await {
            logger.log_warning(&format!("scratch cleanup failed: {}", e));
        }
        metrics::record_transcode_duration(started.elapsed().as_secs_f64());
        Ok(key)
    }

    /// Delete the raw upload of a completed job.
    pub async fn delete_source(&self, source_key: &str) -> WorkerResult<()> {
        self.objects
            .delete_object(&self.raw_bucket, source_key)
            .await?;
        Ok(())
    }
}
