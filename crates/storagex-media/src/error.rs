//! Media errors.

use std::path::PathBuf;
use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("ffmpeg is not installed")]
    FfmpegNotFound,

    #[error("ffprobe is not installed")]
    FfprobeNotFound,

    /// Non-zero exit; `stderr` holds the last lines ffmpeg printed.
    #[error("{message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("{message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("No such media file: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The process was killed at its deadline.
    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unreadable probe output: {0}")]
    ProbeOutput(#[from] serde_json::Error),

    #[error("Invalid video: {0}")]
    InvalidVideo(String),
}

impl MediaError {
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Failures that may succeed when the same input is tried again.
    ///
    /// A non-zero ffmpeg exit means the input itself is bad.
    pub fn is_transient(&self) -> bool {
        matches!(self, MediaError::Timeout(_) | MediaError::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(MediaError::Timeout(1800).is_transient());
        assert!(MediaError::Io(std::io::Error::other("disk")).is_transient());
        assert!(!MediaError::ffmpeg_failed("exit 1", None, Some(1)).is_transient());
        assert!(!MediaError::InvalidVideo("no frames".to_string()).is_transient());
    }
}
