//! Redis-backed cache.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, warn};

use crate::error::CacheResult;
use crate::SummaryCache;

pub struct RedisSummaryCache {
    client: redis::Client,
}

impl RedisSummaryCache {
    pub fn new(redis_url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    async fn try_get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn try_set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn try_delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}

#[async_trait]
impl SummaryCache for RedisSummaryCache {
    async fn get(&self, key: &str) -> Option<String> {
        match self.try_get(key).await {
            Ok(value) => {
                debug!(key, hit = value.is_some(), "Cache lookup");
                value
            }
            Err(e) => {
                warn!(key, error = %e, "Cache get failed, treating as miss");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) {
        if let Err(e) = self.try_set(key, value, ttl).await {
            warn!(key, error = %e, "Cache set failed");
        }
    }

    async fn delete(&self, key: &str) {
        if let Err(e) = self.try_delete(key).await {
            warn!(key, error = %e, "Cache delete failed");
        }
    }
}
