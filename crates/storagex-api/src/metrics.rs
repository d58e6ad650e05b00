//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Install the Prometheus recorder; the handle renders `/metrics`.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "storagex_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "storagex_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "storagex_http_requests_in_flight";

    // Live channel metrics
    pub const WS_CONNECTIONS_TOTAL: &str = "storagex_ws_connections_total";
    pub const WS_CONNECTIONS_ACTIVE: &str = "storagex_ws_connections_active";
    pub const NOTIFICATIONS_PUBLISHED_TOTAL: &str = "storagex_notifications_published_total";
    pub const NOTIFICATIONS_DELIVERED_TOTAL: &str = "storagex_notifications_delivered_total";

    // Jobs
    pub const JOBS_ENQUEUED_TOTAL: &str = "storagex_jobs_enqueued_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "storagex_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_ws_connection() {
    counter!(names::WS_CONNECTIONS_TOTAL).increment(1);
}

pub fn set_ws_active_connections(count: usize) {
    gauge!(names::WS_CONNECTIONS_ACTIVE).set(count as f64);
}

/// Record one published event and how many sessions received it.
pub fn record_notification(status: &str, delivered: usize) {
    let labels = [("status", status.to_string())];
    counter!(names::NOTIFICATIONS_PUBLISHED_TOTAL, &labels).increment(1);
    counter!(names::NOTIFICATIONS_DELIVERED_TOTAL, &labels).increment(delivered as u64);
}

pub fn record_job_enqueued(resolution: &str) {
    let labels = [("resolution", resolution.to_string())];
    counter!(names::JOBS_ENQUEUED_TOTAL, &labels).increment(1);
}

pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Route template of a request, so ids do not explode label cardinality.
pub(crate) fn route_label(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string())
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = route_label(&request);
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    record_http_request(&method, &path, status, start.elapsed().as_secs_f64());

    response
}
