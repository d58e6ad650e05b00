//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Consumer name prefix; each slot appends its index
    pub worker_name: String,
    /// Concurrent consumer slots
    pub concurrency: usize,
    /// Shared scratch root; each worker process works under its own subdirectory
    pub work_dir: String,
    /// Bucket holding raw uploads
    pub raw_bucket: String,
    /// Bucket receiving transcoded output
    pub processed_bucket: String,
    /// Upper bound on a single ffmpeg encode
    pub encode_timeout: Duration,
    /// In-process retries of a transient transcode failure
    pub max_retries: u32,
    /// Base delay of the in-process retry backoff
    pub retry_base_delay: Duration,
    /// Deliveries of one message before it is dead-lettered
    pub max_deliveries: u32,
    /// How long a consume call blocks waiting for a message
    pub consume_block: Duration,
    /// How often each slot looks for messages abandoned by crashed consumers
    pub claim_interval: Duration,
    /// Minimum idle time before a pending message can be claimed
    pub claim_min_idle: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Delete the raw upload once its job completes
    pub delete_source: bool,
    /// Internal notify webhook of the API
    pub notify_url: String,
    /// Port of the Prometheus exporter; 0 disables it
    pub metrics_port: u16,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_name: "storagex-worker".to_string(),
            concurrency: 2,
            work_dir: "/tmp/storagex".to_string(),
            raw_bucket: "raw-videos".to_string(),
            processed_bucket: "processed-videos".to_string(),
            encode_timeout: Duration::from_secs(1800), // 30 minutes
            max_retries: 0,
            retry_base_delay: Duration::from_secs(2),
            max_deliveries: 5,
            consume_block: Duration::from_secs(5),
            claim_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(300), // 5 minutes
            shutdown_timeout: Duration::from_secs(60),
            delete_source: true,
            notify_url: "http://api:8000/internal/notify".to_string(),
            metrics_port: 9100,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        // Processes sharing a host must not share a name: it keys both the
        // Redis consumers and the scratch directory swept at startup.
        let worker_name = std::env::var("WORKER_NAME")
            .or_else(|_| {
                std::env::var("HOSTNAME").map(|host| format!("{}-{}", host, std::process::id()))
            })
            .unwrap_or_else(|_| format!("worker-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]));

        Self {
            worker_name,
            concurrency: env_or("WORKER_CONCURRENCY", defaults.concurrency).max(1),
            work_dir: std::env::var("WORKER_WORK_DIR").unwrap_or(defaults.work_dir),
            raw_bucket: std::env::var("S3_RAW_BUCKET").unwrap_or(defaults.raw_bucket),
            processed_bucket: std::env::var("S3_PROCESSED_BUCKET")
                .unwrap_or(defaults.processed_bucket),
            encode_timeout: Duration::from_secs(env_or("WORKER_ENCODE_TIMEOUT", 1800)),
            max_retries: env_or("WORKER_MAX_RETRIES", defaults.max_retries),
            retry_base_delay: Duration::from_millis(env_or("WORKER_RETRY_BASE_DELAY_MS", 2000)),
            max_deliveries: env_or("QUEUE_MAX_DELIVERIES", defaults.max_deliveries).max(1),
            consume_block: Duration::from_secs(env_or("WORKER_CONSUME_BLOCK_SECS", 5)),
            claim_interval: Duration::from_secs(env_or("WORKER_CLAIM_INTERVAL_SECS", 30)),
            claim_min_idle: Duration::from_secs(env_or("WORKER_CLAIM_MIN_IDLE_SECS", 300)),
            shutdown_timeout: Duration::from_secs(env_or("WORKER_SHUTDOWN_TIMEOUT", 60)),
            delete_source: env_or("WORKER_DELETE_SOURCE", defaults.delete_source),
            notify_url: std::env::var("NOTIFY_URL").unwrap_or(defaults.notify_url),
            metrics_port: env_or("WORKER_METRICS_PORT", defaults.metrics_port),
        }
    }

    /// Scratch directory owned by this process.
    pub fn scratch_root(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join(&self.worker_name)
    }

    /// Consumer name of slot `index`.
    pub fn consumer_name(&self, index: usize) -> String {
        format!("{}-{}", self.worker_name, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.max_deliveries, 5);
        assert_eq!(config.claim_min_idle, Duration::from_secs(300));
        assert_eq!(config.consumer_name(1), "storagex-worker-1");
    }

    #[test]
    fn test_scratch_root_is_per_worker() {
        let a = WorkerConfig {
            worker_name: "host-a-17".to_string(),
            ..WorkerConfig::default()
        };
        let b = WorkerConfig {
            worker_name: "host-a-18".to_string(),
            ..WorkerConfig::default()
        };
        assert_eq!(a.scratch_root(), PathBuf::from("/tmp/storagex/host-a-17"));
        assert_ne!(a.scratch_root(), b.scratch_root());
        assert!(a.scratch_root().starts_with(&b.work_dir));
    }

    #[tokio::test]
    async fn test_startup_sweep_spares_other_workers() {
        let shared = tempfile::tempdir().unwrap();
        let worker = |name: &str| WorkerConfig {
            worker_name: name.to_string(),
            work_dir: shared.path().to_string_lossy().into_owned(),
            ..WorkerConfig::default()
        };
        let running = worker("host-a-17");
        let starting = worker("host-a-18");

        let in_flight = running.scratch_root().join("j1");
        std::fs::create_dir_all(&in_flight).unwrap();
        std::fs::write(in_flight.join("input"), b"raw").unwrap();
        let leftover = starting.scratch_root().join("j0");
        std::fs::create_dir_all(&leftover).unwrap();

        let swept = storagex_media::sweep_scratch(&starting.scratch_root())
            .await
            .unwrap();

        assert_eq!(swept, 1);
        assert!(!leftover.exists());
        assert!(in_flight.join("input").exists());
    }
}
