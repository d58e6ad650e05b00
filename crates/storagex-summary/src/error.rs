//! Summary pipeline errors.

use thiserror::Error;

pub type SummaryResult<T> = Result<T, SummaryError>;

/// Only failures of the system of record escape the pipeline; everything
/// else degrades to a fallback text.
#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("Store error: {0}")]
    Store(#[from] storagex_db::DbError),
}
