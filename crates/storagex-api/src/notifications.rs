//! Per-user fan-out of job status events to live sessions.
//!
//! The registry is process-local. Delivery is best-effort: an event for a
//! user with no open session is dropped, and a session whose buffer is full
//! misses the event.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use storagex_models::{LiveMessage, NotificationEvent, UserId};

/// Handle of one live session.
pub type ConnectionId = u64;

/// Live sessions grouped by user.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<UserId, HashMap<ConnectionId, mpsc::Sender<LiveMessage>>>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session for `user_id`. A user may hold several.
    pub async fn connect(&self, user_id: &UserId, sender: mpsc::Sender<LiveMessage>) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.connections
            .write()
            .await
            .entry(user_id.clone())
            .or_default()
            .insert(id, sender);
        debug!(user_id = %user_id, connection = id, "Live session connected");
        id
    }

    /// Remove a session; the user's entry goes away with its last session.
    ///
    /// Returns whether the session was registered.
    pub async fn disconnect(&self, user_id: &UserId, id: ConnectionId) -> bool {
        let mut connections = self.connections.write().await;
        let Some(sessions) = connections.get_mut(user_id) else {
            return false;
        };
        let removed = sessions.remove(&id).is_some();
        if sessions.is_empty() {
            connections.remove(user_id);
        }
        if removed {
            debug!(user_id = %user_id, connection = id, "Live session disconnected");
        }
        removed
    }

    /// Push `event` to every session of its user. Returns how many accepted it.
    pub async fn publish(&self, user_id: &UserId, event: &NotificationEvent) -> usize {
        let senders: Vec<_> = match self.connections.read().await.get(user_id) {
            Some(sessions) => sessions.values().cloned().collect(),
            None => return 0,
        };

        let message = LiveMessage::from(event);
        let mut delivered = 0;
        for sender in senders {
            match sender.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(user_id = %user_id, "Live session buffer full, dropping event");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }

    /// Open sessions of one user.
    pub async fn connection_count(&self, user_id: &UserId) -> usize {
        self.connections
            .read()
            .await
            .get(user_id)
            .map_or(0, HashMap::len)
    }

    /// Open sessions across all users.
    pub async fn total_connections(&self) -> usize {
        self.connections.read().await.values().map(HashMap::len).sum()
    }
}
