//! Transcoding worker.
//!
//! This crate provides:
//! - A pool of queue consumers with crash recovery and graceful shutdown
//! - The job state machine driving each delivery
//! - Download, encode and upload of media
//! - Status notifications to the API

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod notifier;
pub mod processor;
pub mod retry;
pub mod transcoder;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use notifier::{Notifier, WebhookNotifier};
pub use processor::{Disposition, JobProcessor};
pub use transcoder::Transcoder;
