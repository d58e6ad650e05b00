//! Shared data models for the StorageX media pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs and the job status state machine
//! - Target resolutions for transcoding
//! - AI summaries and their fixed fallback texts
//! - Notification events and the live-channel message schema
//! - Object-store and cache key schemes

pub mod job;
pub mod keys;
pub mod notification;
pub mod resolution;
pub mod summary;

// Re-export common types
pub use job::{Job, JobId, JobStatus, TransitionError, UserId};
pub use keys::{processed_key, raw_key, summary_cache_key, PROCESSED_EXTENSION};
pub use notification::{LiveMessage, NotificationEvent};
pub use resolution::Resolution;
pub use summary::{Summary, ANALYSIS_FALLBACK, SYNTHESIS_FALLBACK, VIDEO_NOT_READY};
