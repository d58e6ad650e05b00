//! AI summaries.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::JobId;

/// Stored in place of a summary when no frame could be sampled.
pub const ANALYSIS_FALLBACK: &str = "could not analyze visual content";

/// Returned when the text-synthesis call fails.
pub const SYNTHESIS_FALLBACK: &str = "could not synthesize summary";

/// Returned when the job has no processed output yet.
pub const VIDEO_NOT_READY: &str = "video not ready";

/// Persisted summary, one per job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Summary {
    pub video_id: JobId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Summary {
    pub fn new(video_id: JobId, text: impl Into<String>) -> Self {
        Self {
            video_id,
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}
