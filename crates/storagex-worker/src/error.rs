//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Notification failed: {0}")]
    NotifyFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] storagex_storage::StorageError),

    #[error("Store error: {0}")]
    Db(#[from] storagex_db::DbError),

    #[error("Media error: {0}")]
    Media(#[from] storagex_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn notify_failed(msg: impl Into<String>) -> Self {
        Self::NotifyFailed(msg.into())
    }

    /// Check if retrying the same transcode may succeed.
    ///
    /// A missing source object and a non-zero ffmpeg exit are permanent.
    pub fn is_retryable(&self) -> bool {
        use storagex_storage::StorageError;
        match self {
            WorkerError::Storage(StorageError::NotFound(_)) => false,
            WorkerError::Storage(_) => true,
            WorkerError::Media(e) => e.is_transient(),
            WorkerError::Io(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storagex_media::MediaError;
    use storagex_storage::StorageError;

    #[test]
    fn test_retryable_classification() {
        assert!(WorkerError::from(MediaError::Timeout(10)).is_retryable());
        assert!(WorkerError::from(StorageError::upload_failed("503")).is_retryable());

        assert!(!WorkerError::from(StorageError::not_found("raw/k")).is_retryable());
        assert!(!WorkerError::from(MediaError::ffmpeg_failed("bad input", None, Some(1)))
            .is_retryable());
    }
}
