//! Job lifecycle log lines.

use std::time::Instant;

use tracing::{error, info, warn, Span};

use storagex_models::JobId;

/// Logs one delivery of a job with its id, stage and, once known, the queue
/// message id attached to every line.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: JobId,
    stage: &'static str,
    message_id: Option<String>,
    started: Instant,
}

impl JobLogger {
    pub fn new(job_id: &JobId, stage: &'static str) -> Self {
        Self {
            job_id: job_id.clone(),
            stage,
            message_id: None,
            started: Instant::now(),
        }
    }

    pub fn with_message(mut self, message_id: &str) -> Self {
        self.message_id = Some(message_id.to_string());
        self
    }

    fn message_id(&self) -> &str {
        self.message_id.as_deref().unwrap_or("-")
    }

    pub fn log_start(&self, detail: &str) {
        info!(job_id = %self.job_id, stage = self.stage, message_id = self.message_id(), "Started: {}", detail);
    }

    pub fn log_progress(&self, detail: &str) {
        info!(job_id = %self.job_id, stage = self.stage, message_id = self.message_id(), "{}", detail);
    }

    pub fn log_warning(&self, detail: &str) {
        warn!(job_id = %self.job_id, stage = self.stage, message_id = self.message_id(), "{}", detail);
    }

    pub fn log_error(&self, detail: &str) {
        error!(job_id = %self.job_id, stage = self.stage, message_id = self.message_id(), "{}", detail);
    }

    /// Logs the outcome with the time since the logger was created.
    pub fn log_completion(&self, detail: &str) {
        info!(
            job_id = %self.job_id,
            stage = self.stage,
            message_id = self.message_id(),
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Completed: {}", detail
        );
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Span entered around one delivery.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "delivery",
            job_id = %self.job_id,
            stage = self.stage,
            message_id = self.message_id()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_defaults_to_placeholder() {
        let logger = JobLogger::new(&JobId::from("j1"), "transcode");
        assert_eq!(logger.job_id().as_str(), "j1");
        assert_eq!(logger.message_id(), "-");

        let logger = logger.with_message("1700000000000-0");
        assert_eq!(logger.message_id(), "1700000000000-0");
    }
}
