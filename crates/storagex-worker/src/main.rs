//! Transcoding worker binary.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use storagex_db::{DbConfig, PostgresJobStore};
use storagex_media::{sweep_scratch, FfmpegEncoder};
use storagex_queue::JobQueue;
use storagex_storage::S3Client;
use storagex_worker::{metrics, JobExecutor, JobProcessor, Transcoder, WebhookNotifier, WorkerConfig};

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("storagex=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting storagex-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if config.metrics_port > 0 {
        if let Err(e) = metrics::init_metrics(config.metrics_port) {
            warn!("Metrics exporter disabled: {}", e);
        }
    }

    // Only this process's own directory: other workers may share the root.
    let scratch_root = config.scratch_root();
    let swept = sweep_scratch(&scratch_root)
        .await
        .context("preparing work directory")?;
    if swept > 0 {
        info!("Removed {} leftover scratch entries", swept);
    }

    let db_config = DbConfig::from_env().context("database config")?;
    let store = Arc::new(
        PostgresJobStore::connect(&db_config)
            .await
            .context("connecting to database")?,
    );
    let objects = Arc::new(S3Client::from_env().context("object store config")?);
    let notifier = Arc::new(WebhookNotifier::new(&config.notify_url, NOTIFY_TIMEOUT)?);

    let queue = JobQueue::from_env().context("queue config")?;
    queue.init_with_retry().await;

    let transcoder = Transcoder::new(
        objects,
        Arc::new(FfmpegEncoder::new(config.encode_timeout)),
        &config.raw_bucket,
        &config.processed_bucket,
        scratch_root,
    );
    let processor = JobProcessor::new(store, notifier, transcoder, &config);
    let executor = Arc::new(JobExecutor::new(config, Arc::new(queue), processor));

    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        signal_executor.shutdown();
    });

    executor.run().await;

    info!("Worker shutdown complete");
    Ok(())
}
