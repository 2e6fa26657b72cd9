//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to configure storage client: {0}")]
    ConfigError(String),

    #[error("Upload failed: {message}")]
    UploadFailed { message: String, retryable: bool },

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Storage request timed out")]
    Timeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn upload_failed(msg: impl Into<String>, retryable: bool) -> Self {
        Self::UploadFailed {
            message: msg.into(),
            retryable,
        }
    }

    pub fn delete_failed(msg: impl Into<String>) -> Self {
        Self::DeleteFailed(msg.into())
    }

    /// Whether the operation may succeed if repeated.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::UploadFailed { retryable, .. } => *retryable,
            StorageError::Timeout | StorageError::Io(_) => true,
            StorageError::DeleteFailed(_) => true,
            StorageError::ConfigError(_) | StorageError::InvalidKey(_) => false,
        }
    }
}
