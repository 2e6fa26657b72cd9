//! Object storage contract.

use std::path::Path;

use async_trait::async_trait;

use crate::cache::UploadOptions;
use crate::error::StorageResult;

/// Durable object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload a local file under `key` and return its public URL.
    async fn upload(&self, local: &Path, key: &str, options: &UploadOptions) -> StorageResult<String>;

    async fn delete(&self, key: &str) -> StorageResult<()>;
}
