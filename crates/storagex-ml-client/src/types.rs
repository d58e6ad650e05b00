//! Wire types of the generate endpoint.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/generate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    /// Base64 images for vision models
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub images: Vec<String>,
    /// Always false: the client waits for the whole answer
    pub stream: bool,
}

impl GenerateRequest {
    pub fn text(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            images: Vec::new(),
            stream: false,
        }
    }

    pub fn with_image(mut self, image_b64: impl Into<String>) -> Self {
        self.images.push(image_b64.into());
        self
    }
}

/// Non-streaming answer.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
}
