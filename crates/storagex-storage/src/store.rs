//! Object store contract.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StorageResult;

/// Byte-blob storage addressed by bucket and key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload a local file.
    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Download an object into a local file, creating parent directories.
    async fn download_file(&self, bucket: &str, key: &str, path: &Path) -> StorageResult<()>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// Time-limited GET URL reachable by end clients.
    async fn presign_get(&self, bucket: &str, key: &str, expires_in: Duration)
        -> StorageResult<String>;

    /// Check that the backing service is reachable.
    async fn check_connectivity(&self) -> StorageResult<()>;
}
