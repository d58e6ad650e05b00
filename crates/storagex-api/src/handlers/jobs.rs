//! Job admission.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use storagex_models::{keys, Job, JobId, JobStatus, NotificationEvent, Resolution, UserId};
use storagex_queue::TranscodeJob;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub owner_id: UserId,
    pub filename: String,
    #[serde(default)]
    pub file_size: i64,
    /// Target resolution; unknown labels mean 720p
    #[serde(default)]
    pub resolution: Resolution,
    /// Raw object already uploaded; defaults to the raw key of the new job
    #[serde(default)]
    pub source_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub source_key: String,
    pub resolution: Resolution,
}

/// `POST /internal/jobs`
///
/// Records a `pending` job and enqueues its transcode.
pub async fn create_job(
    State(state): State<AppState>,
    Json(request): Json<CreateJobRequest>,
) -> ApiResult<(StatusCode, Json<CreateJobResponse>)> {
    let filename = request.filename.trim();
    if filename.is_empty() || filename.contains('/') {
        return Err(ApiError::bad_request("filename must be a plain file name"));
    }
    if request.file_size < 0 {
        return Err(ApiError::bad_request("file_size must not be negative"));
    }

    let job = Job::new(JobId::new(), request.owner_id, filename, request.file_size);
    let source_key = request
        .source_key
        .unwrap_or_else(|| keys::raw_key(&job.owner_id, &job.id, &job.filename));

    state.store.insert_job(&job).await?;
    let message = TranscodeJob::new(job.id.clone(), source_key.clone())
        .with_resolution(request.resolution);
    let message_id = state.queue.enqueue(&message).await?;

    let event = NotificationEvent::for_job(&job);
    state.registry.publish(&job.owner_id, &event).await;
    metrics::record_job_enqueued(request.resolution.as_str());
    info!(
        job_id = %job.id,
        message_id = %message_id,
        resolution = %request.resolution,
        "Job enqueued"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateJobResponse {
            job_id: job.id,
            status: job.status,
            source_key,
            resolution: request.resolution,
        }),
    ))
}
