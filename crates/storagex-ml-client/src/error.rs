//! Inference client errors.

use thiserror::Error;

pub type MlResult<T> = Result<T, MlError>;

#[derive(Debug, Error)]
pub enum MlError {
    /// The service answered 503, usually while a model is loading.
    #[error("Inference service unavailable: {0}")]
    Unavailable(String),

    #[error("Inference service rejected request with {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Malformed inference answer: {0}")]
    MalformedAnswer(String),

    #[error("Inference timed out after {0}s")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}
