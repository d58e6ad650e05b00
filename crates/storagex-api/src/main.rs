//! Axum API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use storagex_api::{create_router, metrics, ApiConfig, AppState};
use storagex_cache::{CacheConfig, RedisSummaryCache};
use storagex_db::{DbConfig, PostgresJobStore};
use storagex_media::FfmpegFrameSampler;
use storagex_ml_client::MlClient;
use storagex_queue::JobQueue;
use storagex_storage::S3Client;
use storagex_summary::{SummaryConfig, SummaryPipeline};

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("storagex=info,tower_http=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    init_tracing();

    info!("Starting storagex-api");

    let config = ApiConfig::from_env();
    info!("API config: host={}, port={}", config.host, config.port);

    let db_config = DbConfig::from_env().context("database config")?;
    let store = Arc::new(
        PostgresJobStore::connect(&db_config)
            .await
            .context("connecting to database")?,
    );
    let objects = Arc::new(S3Client::from_env().context("object store config")?);

    let queue = JobQueue::from_env().context("queue config")?;
    queue.init_with_retry().await;

    let cache_config = CacheConfig::from_env();
    let cache = Arc::new(
        RedisSummaryCache::new(&cache_config.redis_url).context("summary cache config")?,
    );
    let inference = Arc::new(MlClient::from_env().context("inference client config")?);

    let summary_config = SummaryConfig::from_env();
    let summaries = SummaryPipeline::new(
        store.clone(),
        cache,
        objects.clone(),
        Arc::new(FfmpegFrameSampler::new(summary_config.frame_timeout)),
        inference,
        summary_config,
    );

    let state = AppState::new(config.clone(), store, objects, Arc::new(queue), summaries);

    let metrics_enabled = std::env::var("METRICS_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);

    let metrics_handle = if metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => {
                info!("Prometheus metrics enabled at /metrics");
                Some(handle)
            }
            Err(e) => {
                warn!("Metrics disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid bind address")?;

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("serving")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
