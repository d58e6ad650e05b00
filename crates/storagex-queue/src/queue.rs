//! Work queue on Redis Streams.

use std::time::Duration;

use async_trait::async_trait;
use redis::streams::{StreamClaimReply, StreamId, StreamPendingCountReply, StreamReadReply};
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::job::{Delivery, Payload, TranscodeJob};
use crate::WorkQueue;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream name for jobs
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Dead letter stream name
    pub dlq_stream_name: String,
    /// Delay between connection attempts at startup
    pub connect_retry_delay: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "storagex:jobs".to_string(),
            consumer_group: "storagex:workers".to_string(),
            dlq_stream_name: "storagex:dlq".to_string(),
            connect_retry_delay: Duration::from_secs(5),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            stream_name: std::env::var("QUEUE_STREAM").unwrap_or(defaults.stream_name),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or(defaults.consumer_group),
            dlq_stream_name: std::env::var("QUEUE_DLQ_STREAM").unwrap_or(defaults.dlq_stream_name),
            connect_retry_delay: std::env::var("QUEUE_CONNECT_RETRY_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_retry_delay),
        }
    }
}

/// Redis Streams job queue client.
pub struct JobQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl JobQueue {
    /// Create a new job queue. Does not connect.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Initialize the queue (create consumer group if not exists).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Keep calling [`init`](Self::init) until the broker answers.
    pub async fn init_with_retry(&self) {
        loop {
            match self.init().await {
                Ok(()) => return,
                Err(e) => {
                    warn!(
                        "Queue not ready ({}), retrying in {}s",
                        e,
                        self.config.connect_retry_delay.as_secs()
                    );
                    tokio::time::sleep(self.config.connect_retry_delay).await;
                }
            }
        }
    }

    /// Messages in the dead-letter stream.
    pub async fn dlq_len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(&self.config.dlq_stream_name).await?;
        Ok(len)
    }

    /// Decode an entry.
    ///
    /// Payloads that do not even name a job are acked and dropped here;
    /// malformed payloads that do are handed out so the job can be failed.
    async fn decode(&self, entry: &StreamId) -> Option<Delivery> {
        let decoded = entry
            .get::<String>("job")
            .ok_or_else(|| "missing job field".to_string())
            .and_then(|raw| Payload::decode(&raw));

        match decoded {
            Ok(payload) => Some(Delivery {
                message_id: entry.id.clone(),
                payload,
            }),
            Err(e) => {
                warn!(message_id = %entry.id, "Dropping job payload with no job id: {}", e);
                if let Err(e) = self.ack(&entry.id).await {
                    warn!(message_id = %entry.id, "Failed to ack malformed message: {}", e);
                }
                None
            }
        }
    }

    fn retry_key(message_id: &str) -> String {
        format!("storagex:retry:{}", message_id)
    }
}

#[async_trait]
impl WorkQueue for JobQueue {
    async fn enqueue(&self, job: &TranscodeJob) -> QueueResult<String> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload = serde_json::to_string(job)?;
        let message_id: String = conn
            .xadd(&self.config.stream_name, "*", &[("job", payload.as_str())])
            .await
            .map_err(|e| QueueError::enqueue_failed(e.to_string()))?;

        info!(job_id = %job.job_id, "Enqueued job with message ID {}", message_id);
        Ok(message_id)
    }

    async fn consume(&self, consumer: &str, block: Duration) -> QueueResult<Option<Delivery>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        // COUNT 1: a consumer never holds more than one unacked message.
        let reply: Option<StreamReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer)
            .arg("COUNT")
            .arg(1)
            .arg("BLOCK")
            .arg(block.as_millis() as u64)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let Some(reply) = reply else {
            return Ok(None);
        };

        for stream_key in reply.keys {
            for entry in stream_key.ids {
                if let Some(delivery) = self.decode(&entry).await {
                    debug!(job_id = %delivery.job_id(), "Consumed job from stream");
                    return Ok(Some(delivery));
                }
            }
        }

        Ok(None)
    }

    async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Acknowledged message: {}", message_id);
        Ok(())
    }

    async fn claim_pending(
        &self,
        consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> QueueResult<Vec<Delivery>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let min_idle_ms = min_idle.as_millis() as u64;

        let pending: StreamPendingCountReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("IDLE")
            .arg(min_idle_ms)
            .arg("-")
            .arg("+")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        if pending.ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<&str> = pending.ids.iter().map(|p| p.id.as_str()).collect();

        // XCLAIM re-checks idleness, so a message another consumer just
        // claimed is skipped.
        let claimed: StreamClaimReply = redis::cmd("XCLAIM")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer)
            .arg(min_idle_ms)
            .arg(&ids)
            .query_async(&mut conn)
            .await?;

        let mut deliveries = Vec::new();
        for entry in claimed.ids {
            if let Some(delivery) = self.decode(&entry).await {
                info!(job_id = %delivery.job_id(), "Claimed pending job from stream");
                deliveries.push(delivery);
            }
        }

        Ok(deliveries)
    }

    async fn increment_retry(&self, message_id: &str) -> QueueResult<u32> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let key = Self::retry_key(message_id);
        let count: u32 = conn.incr(&key, 1).await?;
        conn.expire::<_, ()>(&key, 86400).await?;
        Ok(count)
    }

    async fn clear_retry(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(Self::retry_key(message_id)).await?;
        Ok(())
    }

    async fn dead_letter(&self, delivery: &Delivery, error: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload = delivery.payload.to_json()?;

        redis::cmd("XADD")
            .arg(&self.config.dlq_stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("error")
            .arg(error)
            .arg("original_id")
            .arg(&delivery.message_id)
            .query_async::<()>(&mut conn)
            .await?;

        warn!(job_id = %delivery.job_id(), "Moved job to DLQ: {}", error);
        Ok(())
    }
}
