//! S3-compatible object storage.
//!
//! This crate provides:
//! - The [`ObjectStore`] contract used by the worker and the API
//! - An S3 client (MinIO in development) with presigned playback URLs
//! - An in-memory store for tests and local runs

pub mod client;
pub mod error;
pub mod memory;
pub mod store;

pub use client::{S3Client, S3Config};
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryObjectStore;
pub use store::ObjectStore;
