//! Notification events and the live-channel message schema.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Job, JobId, JobStatus, UserId};

/// Status event addressed to every live session of one user.
///
/// This is also the body of the internal notify webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NotificationEvent {
    pub user_id: UserId,
    pub video_id: JobId,
    pub status: String,
    pub message: String,
}

impl NotificationEvent {
    pub fn new(
        user_id: UserId,
        video_id: JobId,
        status: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            video_id,
            status: status.into(),
            message: message.into(),
        }
    }

    /// Event describing the job's current status.
    pub fn for_job(job: &Job) -> Self {
        let message = match job.status {
            JobStatus::Pending => "Video queued",
            JobStatus::Processing => "Video is being processed",
            JobStatus::Completed => "Video processed successfully",
            JobStatus::Failed => "Video processing failed",
        };
        Self::new(job.owner_id.clone(), job.id.clone(), job.status.as_str(), message)
    }
}

/// Server-to-client message on the live channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveMessage {
    VideoUpdate {
        video_id: JobId,
        status: String,
        msg: String,
    },
}

impl From<&NotificationEvent> for LiveMessage {
    fn from(event: &NotificationEvent) -> Self {
        LiveMessage::VideoUpdate {
            video_id: event.video_id.clone(),
            status: event.status.clone(),
            msg: event.message.clone(),
        }
    }
}
