//! Delivery of status events to the API's notify webhook.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use storagex_models::NotificationEvent;

use crate::error::{WorkerError, WorkerResult};

/// Sink for job status events.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &NotificationEvent) -> WorkerResult<()>;
}

/// Posts events as JSON to the API, which fans them out to live sessions.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> WorkerResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WorkerError::config_error(format!("HTTP client: {}", e)))?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &NotificationEvent) -> WorkerResult<()> {
        let response = self
            .http
            .post(&self.url)
            .json(event)
            .send()
            .await
            .map_err(|e| WorkerError::notify_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WorkerError::notify_failed(format!(
                "webhook returned {}",
                status
            )));
        }

        debug!(
            video_id = %event.video_id,
            status = %event.status,
            "Notification delivered"
        );
        Ok(())
    }
}
