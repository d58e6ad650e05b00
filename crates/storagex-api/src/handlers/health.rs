//! Liveness and readiness probes.

use std::future::Future;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
}

/// Liveness: the process is serving.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub database: DependencyCheck,
    pub storage: DependencyCheck,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DependencyCheck {
    Ok { latency_ms: u64 },
    Error { error: String },
}

impl DependencyCheck {
    async fn run<E, F>(probe: F) -> Self
    where
        E: std::fmt::Display,
        F: Future<Output = Result<(), E>>,
    {
        let start = Instant::now();
        match probe.await {
            Ok(()) => Self::Ok {
                latency_ms: start.elapsed().as_millis() as u64,
            },
            Err(e) => Self::Error {
                error: e.to_string(),
            },
        }
    }

    fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

/// Readiness: the job store and the object store both answer.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let (database, storage) = tokio::join!(
        DependencyCheck::run(state.store.ping()),
        DependencyCheck::run(state.objects.check_connectivity()),
    );

    let ready = database.is_ok() && storage.is_ok();
    let (code, status) = if ready {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        code,
        Json(ReadinessResponse {
            status,
            checks: ReadinessChecks { database, storage },
        }),
    )
}
