//! In-memory queue for tests and single-process runs.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::error::{QueueError, QueueResult};
use crate::job::{Delivery, Payload, TranscodeJob};
use crate::WorkQueue;

#[derive(Debug)]
struct InFlight {
    delivery: Delivery,
    since: Instant,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    ready: VecDeque<Delivery>,
    in_flight: HashMap<String, InFlight>,
    retries: HashMap<String, u32>,
    dead_letters: Vec<(Delivery, String)>,
    acked: Vec<String>,
}

/// Queue with the same delivery semantics as the Redis one.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    state: Mutex<State>,
    notify: Notify,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages waiting for a consumer.
    pub async fn ready_len(&self) -> usize {
        self.state.lock().await.ready.len()
    }

    /// Messages handed out and not yet acked.
    pub async fn in_flight_len(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }

    pub async fn acked(&self) -> Vec<String> {
        self.state.lock().await.acked.clone()
    }

    pub async fn dead_letters(&self) -> Vec<(Delivery, String)> {
        self.state.lock().await.dead_letters.clone()
    }

    /// Enqueue a raw message body as a producer outside this crate would.
    ///
    /// Bodies that do not name a job are dropped, as the Redis queue drops
    /// them on read; `None` is returned for those.
    pub async fn enqueue_raw(&self, raw: &str) -> Option<String> {
        let payload = Payload::decode(raw).ok()?;
        Some(self.push(payload).await)
    }

    async fn push(&self, payload: Payload) -> String {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let message_id = format!("{}-0", state.next_id);
        state.ready.push_back(Delivery {
            message_id: message_id.clone(),
            payload,
        });
        drop(state);
        self.notify.notify_one();
        message_id
    }
}

#[async_trait]
impl WorkQueue for InMemoryQueue {
    async fn enqueue(&self, job: &TranscodeJob) -> QueueResult<String> {
        Ok(self.push(Payload::Job(job.clone())).await)
    }

    async fn consume(&self, _consumer: &str, block: Duration) -> QueueResult<Option<Delivery>> {
        let deadline = Instant::now() + block;
        loop {
            {
                let mut state = self.state.lock().await;
                if let Some(delivery) = state.ready.pop_front() {
                    state.in_flight.insert(
                        delivery.message_id.clone(),
                        InFlight {
                            delivery: delivery.clone(),
                            since: Instant::now(),
                        },
                    );
                    return Ok(Some(delivery));
                }
            }
            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                return Ok(None);
            }
        }
    }

    async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut state = self.state.lock().await;
        if state.in_flight.remove(message_id).is_none() {
            return Err(QueueError::UnknownMessage(message_id.to_string()));
        }
        state.acked.push(message_id.to_string());
        Ok(())
    }

    async fn claim_pending(
        &self,
        _consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> QueueResult<Vec<Delivery>> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let mut claimed = Vec::new();
        for entry in state.in_flight.values_mut() {
            if claimed.len() >= count {
                break;
            }
            if now.duration_since(entry.since) >= min_idle {
                entry.since = now;
                claimed.push(entry.delivery.clone());
            }
        }
        Ok(claimed)
    }

    async fn increment_retry(&self, message_id: &str) -> QueueResult<u32> {
        let mut state = self.state.lock().await;
        let count = state.retries.entry(message_id.to_string()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn clear_retry(&self, message_id: &str) -> QueueResult<()> {
        self.state.lock().await.retries.remove(message_id);
        Ok(())
    }

    async fn dead_letter(&self, delivery: &Delivery, error: &str) -> QueueResult<()> {
        self.state
            .lock()
            .await
            .dead_letters
            .push((delivery.clone(), error.to_string()));
        Ok(())
    }
}
