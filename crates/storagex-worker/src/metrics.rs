//! Prometheus metrics for the worker.

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub mod names {
    pub const JOBS_COMPLETED_TOTAL: &str = "storagex_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "storagex_jobs_failed_total";
    pub const JOBS_DEAD_LETTERED_TOTAL: &str = "storagex_jobs_dead_lettered_total";
    pub const TRANSCODE_DURATION_SECONDS: &str = "storagex_transcode_duration_seconds";
    pub const ENCODE_DURATION_SECONDS: &str = "storagex_encode_duration_seconds";
}

/// Serve metrics on `0.0.0.0:port` from a background listener.
pub fn init_metrics(port: u16) -> Result<(), BuildError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new().with_http_listener(addr).install()
}

pub fn record_job_completed(resolution: &str) {
    let labels = [("resolution", resolution.to_string())];
    counter!(names::JOBS_COMPLETED_TOTAL, &labels).increment(1);
}

pub fn record_job_failed(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn record_dead_lettered() {
    counter!(names::JOBS_DEAD_LETTERED_TOTAL).increment(1);
}

/// Download, encode and upload of one job.
pub fn record_transcode_duration(duration_secs: f64) {
    histogram!(names::TRANSCODE_DURATION_SECONDS).record(duration_secs);
}

pub fn record_encode_duration(resolution: &str, duration_secs: f64) {
    let labels = [("resolution", resolution.to_string())];
    histogram!(names::ENCODE_DURATION_SECONDS, &labels).record(duration_secs);
}
