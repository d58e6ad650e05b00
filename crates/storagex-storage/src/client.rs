//! S3 client implementation.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::store::ObjectStore;

/// Configuration for the S3 client.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Endpoint the services use (e.g. `http://minio:9000`)
    pub endpoint_url: String,
    /// Endpoint end clients can reach; presigned URLs carry this host
    pub public_endpoint_url: Option<String>,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Region
    pub region: String,
    /// Bucket holding raw uploads
    pub raw_bucket: String,
    /// Bucket holding transcoded output
    pub processed_bucket: String,
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("S3_ENDPOINT")
                .unwrap_or_else(|_| "http://minio:9000".to_string()),
            public_endpoint_url: std::env::var("S3_PUBLIC_ENDPOINT")
                .ok()
                .filter(|s| !s.is_empty()),
            access_key_id: std::env::var("S3_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("S3_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("S3_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("S3_SECRET_ACCESS_KEY not set"))?,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            raw_bucket: std::env::var("S3_RAW_BUCKET")
                .unwrap_or_else(|_| "raw-videos".to_string()),
            processed_bucket: std::env::var("S3_PROCESSED_BUCKET")
                .unwrap_or_else(|_| "processed-videos".to_string()),
        })
    }
}

/// S3-compatible storage client.
///
/// Presigned URLs are signed against the public endpoint when one is
/// configured, so the internal service alias never leaks to clients and the
/// signature stays valid for the host the client actually hits.
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    presign_client: Client,
    raw_bucket: String,
}

fn build_client(config: &S3Config, endpoint: &str) -> Client {
    let credentials = Credentials::new(
        &config.access_key_id,
        &config.secret_access_key,
        None,
        None,
        "storagex",
    );

    let sdk_config = Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .endpoint_url(endpoint)
        .region(Region::new(config.region.clone()))
        .credentials_provider(credentials)
        .force_path_style(true)
        .build();

    Client::from_conf(sdk_config)
}

impl S3Client {
    /// Create a new client from configuration.
    pub fn new(config: &S3Config) -> Self {
        let client = build_client(config, &config.endpoint_url);
        let presign_client = match &config.public_endpoint_url {
            Some(public) => build_client(config, public),
            None => client.clone(),
        };

        Self {
            client,
            presign_client,
            raw_bucket: config.raw_bucket.clone(),
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let config = S3Config::from_env()?;
        Ok(Self::new(&config))
    }
}

fn is_not_found(msg: &str) -> bool {
    msg.contains("NoSuchKey") || msg.contains("NotFound")
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<()> {
        debug!("Uploading {} to {}/{}", path.display(), bucket, key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!("Uploaded {} to {}/{}", path.display(), bucket, key);
        Ok(())
    }

    async fn download_file(&self, bucket: &str, key: &str, path: &Path) -> StorageResult<()> {
        debug!("Downloading {}/{} to {}", bucket, key, path.display());

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if is_not_found(&msg) {
                    StorageError::not_found(key)
                } else {
                    StorageError::download_failed(msg)
                }
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::download_failed(e.to_string()))?
            .into_bytes();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::download_failed(format!("Failed to create directory: {}", e))
            })?;
        }

        tokio::fs::write(path, &bytes)
            .await
            .map_err(|e| StorageError::download_failed(format!("Failed to write file: {}", e)))?;

        info!("Downloaded {}/{} to {}", bucket, key, path.display());
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        debug!("Deleting {}/{}", bucket, key);

        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed(e.to_string()))?;

        Ok(())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .presign_client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.raw_bucket)
            .send()
            .await
            .map_err(|e| StorageError::Unreachable(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(public: Option<&str>) -> S3Config {
        S3Config {
            endpoint_url: "http://minio:9000".to_string(),
            public_endpoint_url: public.map(str::to_string),
            access_key_id: "minioadmin".to_string(),
            secret_access_key: "minioadmin".to_string(),
            region: "us-east-1".to_string(),
            raw_bucket: "raw-videos".to_string(),
            processed_bucket: "processed-videos".to_string(),
        }
    }

    #[tokio::test]
    async fn test_presign_uses_public_host() {
        let client = S3Client::new(&config(Some("http://localhost:9000")));
        let url = client
            .presign_get("processed-videos", "processed/user_1/j1.mp4", Duration::from_secs(3600))
            .await
            .unwrap();

        assert!(url.starts_with("http://localhost:9000/processed-videos/"), "{url}");
        assert!(!url.contains("minio:9000"));
        assert!(url.contains("X-Amz-Expires=3600"));
    }

    #[tokio::test]
    async fn test_presign_without_public_host_keeps_endpoint() {
        let client = S3Client::new(&config(None));
        let url = client
            .presign_get("processed-videos", "k.mp4", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(url.starts_with("http://minio:9000/processed-videos/k.mp4"), "{url}");
    }
}
