//! Redis Streams work queue.
//!
//! This crate provides:
//! - Job enqueueing via Redis Streams
//! - Consumer-group delivery with prefetch 1 and explicit ack
//! - Reclaiming messages left pending by crashed workers
//! - Delivery counting and a dead-letter stream

pub mod error;
pub mod job;
pub mod memory;
pub mod queue;

use std::time::Duration;

use async_trait::async_trait;

pub use error::{QueueError, QueueResult};
pub use job::{Delivery, Payload, TranscodeJob};
pub use memory::InMemoryQueue;
pub use queue::{JobQueue, QueueConfig};

/// At-least-once work queue contract.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Durably enqueue a job. Returns the broker message id.
    async fn enqueue(&self, job: &TranscodeJob) -> QueueResult<String>;

    /// Wait up to `block` for the next message for `consumer`.
    ///
    /// At most one message is handed out per call; it stays pending until
    /// acked.
    async fn consume(&self, consumer: &str, block: Duration) -> QueueResult<Option<Delivery>>;

    /// Acknowledge and drop a message.
    async fn ack(&self, message_id: &str) -> QueueResult<()>;

    /// Take over messages left pending longer than `min_idle`.
    async fn claim_pending(
        &self,
        consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> QueueResult<Vec<Delivery>>;

    /// Count one more delivery attempt of a message. Returns the new count.
    async fn increment_retry(&self, message_id: &str) -> QueueResult<u32>;

    /// Forget the delivery count of a message.
    async fn clear_retry(&self, message_id: &str) -> QueueResult<()>;

    /// Copy a message to the dead-letter stream. Does not ack.
    async fn dead_letter(&self, delivery: &Delivery, error: &str) -> QueueResult<()>;
}
