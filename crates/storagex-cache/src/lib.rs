//! Cache tier for generated summaries.
//!
//! The cache is a performance shadow of the persistent store: every backend
//! failure is logged and treated as a miss, never surfaced to callers.

pub mod error;
pub mod memory;
pub mod redis_cache;

use std::time::Duration;

use async_trait::async_trait;

pub use error::{CacheError, CacheResult};
pub use memory::InMemorySummaryCache;
pub use redis_cache::RedisSummaryCache;

/// Default time-to-live of a cached summary.
pub const DEFAULT_SUMMARY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub redis_url: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
        }
    }
}

impl CacheConfig {
    /// Create config from environment variables.
    ///
    /// `CACHE_REDIS_URL` wins over `REDIS_URL` so the cache can live on a
    /// separate instance from the queue.
    pub fn from_env() -> Self {
        let redis_url = std::env::var("CACHE_REDIS_URL")
            .or_else(|_| std::env::var("REDIS_URL"))
            .unwrap_or_else(|_| Self::default().redis_url);
        Self { redis_url }
    }
}

/// Key/value cache with expiry. All operations are infallible to the caller.
#[async_trait]
pub trait SummaryCache: Send + Sync {
    /// Cached value, or `None` on miss or backend error.
    async fn get(&self, key: &str) -> Option<String>;

    /// Store a value; backend errors are logged and swallowed.
    async fn set(&self, key: &str, value: &str, ttl: Duration);

    /// Drop a value; backend errors are logged and swallowed.
    async fn delete(&self, key: &str);
}
