//! AI summarization of transcoded videos.
//!
//! Frames are sampled from the processed output, described by a vision
//! model, and folded into a short summary by a text model. Results are
//! persisted once per job and shadowed in the cache tier.

pub mod error;
pub mod pipeline;
pub mod prompts;

pub use error::{SummaryError, SummaryResult};
pub use pipeline::{SummaryConfig, SummaryPipeline, SAMPLE_FRACTIONS};
