//! Client for the inference service.
//!
//! Talks to an Ollama-compatible `/api/generate` endpoint: one vision model
//! describes still frames, one text model writes the final summary.

pub mod client;
pub mod error;
pub mod types;

use async_trait::async_trait;

pub use client::{MlClient, MlClientConfig};
pub use error::{MlError, MlResult};
pub use types::{GenerateRequest, GenerateResponse};

/// Inference operations used by the summarization pipeline.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Describe one base64-encoded JPEG with the vision model.
    async fn describe_frame(&self, prompt: &str, image_b64: &str) -> MlResult<String>;

    /// Complete a text prompt with the text model.
    async fn complete(&self, prompt: &str) -> MlResult<String>;
}
