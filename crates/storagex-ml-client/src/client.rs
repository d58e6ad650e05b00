//! Inference service HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::error::{MlError, MlResult};
use crate::types::{GenerateRequest, GenerateResponse};
use crate::InferenceClient;

/// Configuration for the inference client.
#[derive(Debug, Clone)]
pub struct MlClientConfig {
    /// Full URL of the generate endpoint
    pub generate_url: String,
    /// Model used to describe frames
    pub vision_model: String,
    /// Model used to write summaries
    pub text_model: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Extra attempts on network errors
    pub max_retries: u32,
}

impl Default for MlClientConfig {
    fn default() -> Self {
        Self {
            generate_url: "http://ollama:11434/api/generate".to_string(),
            vision_model: "moondream".to_string(),
            text_model: "llama3.2:1b".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 1,
        }
    }
}

impl MlClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            generate_url: std::env::var("OLLAMA_URL").unwrap_or(defaults.generate_url),
            vision_model: std::env::var("VISION_MODEL").unwrap_or(defaults.vision_model),
            text_model: std::env::var("TEXT_MODEL").unwrap_or(defaults.text_model),
            timeout: std::env::var("INFERENCE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: std::env::var("INFERENCE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
        }
    }
}

/// Client for an Ollama-compatible inference service.
pub struct MlClient {
    http: Client,
    config: MlClientConfig,
}

impl MlClient {
    /// Create a new client.
    pub fn new(config: MlClientConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> MlResult<Self> {
        Self::new(MlClientConfig::from_env())
    }

    pub fn config(&self) -> &MlClientConfig {
        &self.config
    }

    /// Send one generate request and return the answer text.
    pub async fn generate(&self, request: &GenerateRequest) -> MlResult<String> {
        debug!(model = %request.model, images = request.images.len(), "Sending generate request");

        let response = self
            .with_retry(|| async {
                self.http
                    .post(&self.config.generate_url)
                    .json(request)
                    .send()
                    .await
                    .map_err(|e| self.map_send_error(e))
            })
            .await?;

        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(MlError::Unavailable(status.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MlError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| MlError::MalformedAnswer(e.to_string()))?;
        Ok(body.response.trim().to_string())
    }

    fn map_send_error(&self, e: reqwest::Error) -> MlError {
        if e.is_timeout() {
            MlError::Timeout(self.config.timeout.as_secs())
        } else {
            MlError::Network(e)
        }
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> MlResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = MlResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                // A timed-out request already used the whole budget.
                Err(e @ MlError::Network(_)) if attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    warn!(
                        "Inference request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl InferenceClient for MlClient {
    async fn describe_frame(&self, prompt: &str, image_b64: &str) -> MlResult<String> {
        let request =
            GenerateRequest::text(&self.config.vision_model, prompt).with_image(image_b64);
        self.generate(&request).await
    }

    async fn complete(&self, prompt: &str) -> MlResult<String> {
        let request = GenerateRequest::text(&self.config.text_model, prompt);
        self.generate(&request).await
    }
}
