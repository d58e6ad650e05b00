//! In-memory cache with expiry, for tests and single-process runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::warn;

use crate::error::CacheError;
use crate::SummaryCache;

#[derive(Debug, Default)]
pub struct InMemorySummaryCache {
    entries: RwLock<HashMap<String, (String, Instant)>>,
    offline: AtomicBool,
}

impl InMemorySummaryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a cache outage.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SummaryCache for InMemorySummaryCache {
    async fn get(&self, key: &str) -> Option<String> {
        if self.is_offline() {
            warn!(key, error = %CacheError::Offline, "Cache get failed, treating as miss");
            return None;
        }
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|(_, expires_at)| Instant::now() < *expires_at)
            .map(|(value, _)| value.clone())
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) {
        if self.is_offline() {
            warn!(key, error = %CacheError::Offline, "Cache set failed");
            return;
        }
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
    }

    async fn delete(&self, key: &str) {
        if self.is_offline() {
            warn!(key, error = %CacheError::Offline, "Cache delete failed");
            return;
        }
        self.entries.write().await.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let cache = InMemorySummaryCache::new();
        cache.set("summary:j1", "hello", Duration::from_secs(10)).await;
        assert_eq!(cache.get("summary:j1").await.as_deref(), Some("hello"));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.get("summary:j1").await, None);
    }

    #[tokio::test]
    async fn test_offline_is_a_miss() {
        let cache = InMemorySummaryCache::new();
        cache.set("k", "v", Duration::from_secs(60)).await;
        cache.set_offline(true);
        assert_eq!(cache.get("k").await, None);
        cache.set_offline(false);
        assert_eq!(cache.get("k").await.as_deref(), Some("v"));
    }
}
