//! Work queue errors.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    /// XADD did not return a message id.
    #[error("Enqueue failed: {0}")]
    EnqueueFailed(String),

    /// Ack or claim of an id the consumer group never delivered.
    #[error("Unknown message: {0}")]
    UnknownMessage(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Bad job payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl QueueError {
    pub fn enqueue_failed(msg: impl Into<String>) -> Self {
        Self::EnqueueFailed(msg.into())
    }
}
