//! Video status, playback and summary handlers.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use storagex_models::{Job, JobId, JobStatus};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

async fn load_job(state: &AppState, job_id: &JobId) -> ApiResult<Job> {
    state
        .store
        .get_job(job_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("video {}", job_id)))
}

/// `GET /api/videos/status/:job_id`
pub async fn get_video_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Job>> {
    let job = load_job(&state, &JobId::from_string(job_id)).await?;
    Ok(Json(job))
}

#[derive(Debug, Serialize)]
pub struct PlayUrlResponse {
    pub url: String,
    pub expires_in: u64,
}

/// `GET /api/videos/:job_id/play-url`
pub async fn get_play_url(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<PlayUrlResponse>> {
    let job = load_job(&state, &JobId::from_string(job_id)).await?;
    let key = match (&job.status, &job.s3_key) {
        (JobStatus::Completed, Some(key)) => key,
        _ => {
            return Err(ApiError::conflict(format!(
                "video {} is {}",
                job.id, job.status
            )))
        }
    };

    let ttl = state.config.presign_ttl;
    let url = state
        .objects
        .presign_get(&state.config.processed_bucket, key, ttl)
        .await?;

    Ok(Json(PlayUrlResponse {
        url,
        expires_in: ttl.as_secs(),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub video_id: JobId,
    pub summary: String,
}

/// `POST /api/videos/:job_id/summary?force=bool`
pub async fn summarize_video(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<Json<SummaryResponse>> {
    let video_id = JobId::from_string(job_id);
    let summary = state.summaries.summarize(&video_id, query.force).await?;
    Ok(Json(SummaryResponse { video_id, summary }))
}
