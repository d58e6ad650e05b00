//! Axum HTTP/WebSocket API server.
//!
//! This crate provides:
//! - Job status, playback URLs and AI summaries
//! - Job admission onto the transcode queue
//! - Live status notifications over WebSocket, fed by the worker webhook
//! - Rate limiting and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod notifications;
pub mod routes;
pub mod state;
pub mod ws;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use notifications::{ConnectionId, ConnectionRegistry};
pub use routes::create_router;
pub use state::AppState;
