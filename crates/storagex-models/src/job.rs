//! Job definitions and the job status state machine.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of the user owning a job.
///
/// The relational store keys users by integer, while other callers hand the
/// id around as a string. Both forms deserialize; it always serializes as a
/// string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawUserId", into = "String")]
pub struct UserId(String);

impl JsonSchema for UserId {
    fn schema_name() -> String {
        "UserId".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawUserId {
    Int(i64),
    Str(String),
}

impl From<RawUserId> for UserId {
    fn from(raw: RawUserId) -> Self {
        match raw {
            RawUserId::Int(n) => Self(n.to_string()),
            RawUserId::Str(s) => Self(s),
        }
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Job processing status.
///
/// `Pending` is the only initial state; `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Admitted, waiting for a worker
    #[default]
    Pending,
    /// A worker owns the queue message and is transcoding
    Processing,
    /// Transcoded output uploaded
    Completed,
    /// Transcoding failed
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether moving from `self` to `next` follows
    /// `pending -> processing -> {completed, failed}`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(format!("Unknown job status: {}", s)),
        }
    }
}

/// Rejected status change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid transition for job {job_id}: {from} -> {to}")]
pub struct TransitionError {
    pub job_id: JobId,
    pub from: JobStatus,
    pub to: JobStatus,
}

/// One user-submitted media item tracked through transcoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    pub id: JobId,
    pub owner_id: UserId,
    pub filename: String,
    pub status: JobStatus,
    /// Processed object key, present only once completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_key: Option<String>,
    pub file_size: i64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a freshly admitted job.
    pub fn new(
        id: JobId,
        owner_id: impl Into<UserId>,
        filename: impl Into<String>,
        file_size: i64,
    ) -> Self {
        Self {
            id,
            owner_id: owner_id.into(),
            filename: filename.into(),
            status: JobStatus::Pending,
            s3_key: None,
            file_size,
            created_at: Utc::now(),
            processed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                job_id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// `pending -> processing`.
    pub fn start_processing(&mut self) -> Result<(), TransitionError> {
        self.transition(JobStatus::Processing)
    }

    /// `processing -> completed`, recording where the output lives.
    pub fn complete(&mut self, s3_key: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(JobStatus::Completed)?;
        self.s3_key = Some(s3_key.into());
        self.processed_at = Some(Utc::now());
        Ok(())
    }

    /// `processing -> failed`. Clears any output key.
    pub fn fail(&mut self) -> Result<(), TransitionError> {
        self.transition(JobStatus::Failed)?;
        self.s3_key = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(JobId::from("j1"), "u1", "clip.mp4", 1024)
    }

    #[test]
    fn test_forward_transitions_only() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));

        assert!(!Processing.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Processing));
        assert!(!Completed.can_transition_to(Completed));
    }

    #[test]
    fn test_complete_sets_key_and_processed_at() {
        let mut job = job();
        job.start_processing().unwrap();
        assert!(job.s3_key.is_none());

        job.complete("processed/user_u1/j1.mp4").unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.s3_key.as_deref(), Some("processed/user_u1/j1.mp4"));
        assert!(job.processed_at.is_some());
    }

    #[test]
    fn test_terminal_job_rejects_changes() {
        let mut job = job();
        job.start_processing().unwrap();
        job.fail().unwrap();
        assert!(job.s3_key.is_none());

        let err = job.complete("processed/user_u1/j1.mp4").unwrap_err();
        assert_eq!(err.from, JobStatus::Failed);
        assert_eq!(err.to, JobStatus::Completed);
        assert!(job.s3_key.is_none());
        assert!(job.start_processing().is_err());
    }

    #[test]
    fn test_cannot_complete_from_pending() {
        let mut job = job();
        assert!(job.complete("x").is_err());
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.s3_key.is_none());
    }

    #[test]
    fn test_user_id_accepts_int_and_string() {
        let from_int: UserId = serde_json::from_str("42").unwrap();
        let from_str: UserId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(from_int, from_str);
        assert_eq!(serde_json::to_string(&from_int).unwrap(), "\"42\"");
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(serde_json::to_string(&JobStatus::Processing).unwrap(), "\"processing\"");
        assert_eq!("COMPLETED".parse::<JobStatus>().unwrap(), JobStatus::Completed);
        assert!("dead_lettered".parse::<JobStatus>().is_err());
    }
}
