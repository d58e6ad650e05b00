//! API routes.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    create_job, get_play_url, get_video_status, health, notify, ready, summarize_video,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, IpRateLimiter,
};
use crate::state::AppState;
use crate::ws::ws_notifications;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let summary_limiter = Arc::new(
        IpRateLimiter::new(
            state.config.summary_rate_limit,
            state.config.summary_rate_window,
        )
        .with_trusted_proxies(state.config.trusted_proxies.clone()),
    );

    // Summaries run inference, so they are limited per client IP.
    let summary_routes = Router::new()
        .route("/videos/:job_id/summary", post(summarize_video))
        .layer(middleware::from_fn_with_state(
            summary_limiter,
            rate_limit_middleware,
        ));

    let api_routes = Router::new()
        .route("/videos/status/:job_id", get(get_video_status))
        .route("/videos/:job_id/play-url", get(get_play_url))
        .merge(summary_routes);

    // Trusted callers only (worker, producer).
    let internal_routes = Router::new()
        .route("/internal/notify", post(notify))
        .route("/internal/jobs", post(create_job));

    let ws_routes = Router::new().route("/ws/:user_id", get(ws_notifications));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(internal_routes)
        .merge(ws_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_logging))
        .layer(middleware::from_fn(request_id))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
