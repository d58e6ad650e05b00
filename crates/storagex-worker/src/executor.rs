//! Consumer pool.
//!
//! Each slot consumes one message at a time, so the pool never holds more
//! than `concurrency` unacked messages. A slot also periodically claims
//! messages abandoned by crashed consumers and processes them itself.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, warn, Instrument};

use storagex_queue::{Delivery, Payload, QueueResult, WorkQueue};

use crate::config::WorkerConfig;
use crate::logging::JobLogger;
use crate::metrics;
use crate::processor::{Disposition, JobProcessor};
use crate::retry::FailureTracker;

const QUEUE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Job executor that processes jobs from the queue.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<dyn WorkQueue>,
    processor: Arc<JobProcessor>,
    shutdown: watch::Sender<bool>,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, queue: Arc<dyn WorkQueue>, processor: JobProcessor) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            queue,
            processor: Arc::new(processor),
            shutdown,
        }
    }

    /// Run every consumer slot until shutdown is requested.
    ///
    /// After shutdown, slots finish their current job; whatever is still
    /// running when the shutdown timeout expires is aborted and its message
    /// stays pending for another consumer.
    pub async fn run(&self) {
        info!(
            "Starting job executor '{}' with {} consumer slots",
            self.config.worker_name, self.config.concurrency
        );

        let handles: Vec<_> = (0..self.config.concurrency)
            .map(|index| {
                let slot = ConsumerSlot {
                    name: self.config.consumer_name(index),
                    config: self.config.clone(),
                    queue: Arc::clone(&self.queue),
                    processor: Arc::clone(&self.processor),
                    shutdown: self.shutdown.subscribe(),
                };
                tokio::spawn(slot.run())
            })
            .collect();
        let abort_handles: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

        let slots = join_all(handles);
        tokio::pin!(slots);
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::select! {
            results = &mut slots => {
                for result in results {
                    if let Err(e) = result {
                        error!("Consumer slot panicked: {}", e);
                    }
                }
            }
            _ = wait_for_shutdown(&mut shutdown_rx) => {
                info!(
                    "Shutdown requested, waiting up to {:?} for in-flight jobs",
                    self.config.shutdown_timeout
                );
                if tokio::time::timeout(self.config.shutdown_timeout, &mut slots)
                    .await
                    .is_err()
                {
                    warn!("Shutdown timeout reached, aborting in-flight jobs");
                    for handle in abort_handles {
                        handle.abort();
                    }
                }
            }
        }

        info!("Job executor stopped");
    }

    /// Signal all slots to stop after their current job.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

struct ConsumerSlot {
    name: String,
    config: WorkerConfig,
    queue: Arc<dyn WorkQueue>,
    processor: Arc<JobProcessor>,
    shutdown: watch::Receiver<bool>,
}

impl ConsumerSlot {
    async fn run(mut self) {
        info!(consumer = %self.name, "Consumer slot started");
        let mut failures = FailureTracker::new(3);
        // Claim once at startup to pick up work left by a previous run.
        let mut next_claim = Instant::now();

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let next = match self.claim_if_due(&mut next_claim).await {
                Ok(Some(delivery)) => Ok(Some(delivery)),
                Ok(None) => self.queue.consume(&self.name, self.config.consume_block).await,
                Err(e) => Err(e),
            };

            match next {
                Ok(Some(delivery)) => {
                    failures.record_success();
                    self.handle(delivery).await;
                }
                Ok(None) => failures.record_success(),
                Err(e) => {
                    if failures.record_failure(&e) {
                        error!(consumer = %self.name, "Queue error: {}", e);
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(QUEUE_ERROR_BACKOFF) => {}
                        _ = wait_for_shutdown(&mut self.shutdown) => break,
                    }
                }
            }
        }

        info!(consumer = %self.name, "Consumer slot stopped");
    }

    async fn claim_if_due(&self, next_claim: &mut Instant) -> QueueResult<Option<Delivery>> {
        if Instant::now() < *next_claim {
            return Ok(None);
        }
        *next_claim = Instant::now() + self.config.claim_interval;

        let claimed = self
            .queue
            .claim_pending(&self.name, self.config.claim_min_idle, 1)
            .await?;
        if let Some(delivery) = claimed.first() {
            info!(
                consumer = %self.name,
                message_id = %delivery.message_id,
                "Claimed abandoned message"
            );
        }
        Ok(claimed.into_iter().next())
    }

    async fn handle(&self, delivery: Delivery) {
        let logger =
            JobLogger::new(delivery.job_id(), "transcode").with_message(&delivery.message_id);
        let span = logger.create_span();

        async {
            let deliveries = match self.queue.increment_retry(&delivery.message_id).await {
                Ok(n) => n,
                Err(e) => {
                    logger.log_warning(&format!("delivery count unavailable: {}", e));
                    1
                }
            };

            let disposition = match &delivery.payload {
                Payload::Malformed { job_id, error, .. } => {
                    let reason = format!("malformed payload: {}", error);
                    self.processor
                        .give_up(job_id, &reason, "malformed_payload")
                        .await
                }
                Payload::Job(job) if deliveries > self.config.max_deliveries => {
                    let reason = format!("exceeded {} deliveries", self.config.max_deliveries);
                    match self
                        .processor
                        .give_up(&job.job_id, &reason, "max_deliveries")
                        .await
                    {
                        Disposition::Ack => Disposition::DeadLetter(reason),
                        other => other,
                    }
                }
                Payload::Job(job) => self.processor.process(job).await,
            };

            self.settle(&delivery, disposition, &logger).await;
        }
        .instrument(span)
        .await
    }

    async fn settle(&self, delivery: &Delivery, disposition: Disposition, logger: &JobLogger) {
        match disposition {
            Disposition::Ack => {}
            Disposition::DeadLetter(reason) => {
                if let Err(e) = self.queue.dead_letter(delivery, &reason).await {
                    logger.log_error(&format!("dead-letter failed, leaving pending: {}", e));
                    return;
                }
                metrics::record_dead_lettered();
                logger.log_warning(&format!("dead-lettered: {}", reason));
            }
            Disposition::Abandon => {
                logger.log_warning("left pending for redelivery");
                return;
            }
        }

        if let Err(e) = self.queue.ack(&delivery.message_id).await {
            logger.log_error(&format!("ack failed: {}", e));
            return;
        }
        if let Err(e) = self.queue.clear_retry(&delivery.message_id).await {
            logger.log_warning(&format!("failed to clear delivery count: {}", e));
        }
    }
}
