//! Persistent store for jobs and summaries.
//!
//! The relational schema (`video_jobs`, `video_summaries`) is owned by the
//! upload service; this crate only reads and writes the columns the pipeline
//! needs.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{DbError, DbResult};
pub use memory::InMemoryJobStore;
pub use postgres::{DbConfig, PostgresJobStore};
pub use store::JobStore;
