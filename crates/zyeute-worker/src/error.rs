//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Whether a failed attempt is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Permanent,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Transient => "transient",
            ErrorClass::Permanent => "permanent",
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Media error: {0}")]
    Media(#[from] zyeute_media::MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] zyeute_storage::StorageError),

    #[error("Safety service error: {0}")]
    Safety(#[from] zyeute_safety::SafetyError),

    #[error("Record store error: {0}")]
    Records(#[from] zyeute_records::RecordsError),

    #[error("Queue error: {0}")]
    Queue(#[from] zyeute_queue::QueueError),

    #[error("Safety verdict undetermined: {reason}")]
    SafetyUndetermined { reason: String, retryable: bool },

    #[error("Record update refused: {0}")]
    RecordRefused(String),

    #[error("Side effect failed: {0}")]
    SideEffect(String),

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn processing_failed(msg: impl Into<String>) -> Self {
        Self::ProcessingFailed(msg.into())
    }

    pub fn record_refused(msg: impl Into<String>) -> Self {
        Self::RecordRefused(msg.into())
    }

    pub fn side_effect(msg: impl Into<String>) -> Self {
        Self::SideEffect(msg.into())
    }

    /// Map the failure to transient or permanent.
    pub fn class(&self) -> ErrorClass {
        let transient = match self {
            WorkerError::Media(e) => e.is_transient(),
            WorkerError::Storage(e) => e.is_retryable(),
            WorkerError::Safety(e) => e.is_retryable(),
            WorkerError::Records(e) => e.is_retryable(),
            WorkerError::Queue(e) => !matches!(
                e,
                zyeute_queue::QueueError::InvalidJob(_) | zyeute_queue::QueueError::Json(_)
            ),
            WorkerError::SafetyUndetermined { retryable, .. } => *retryable,
            WorkerError::SideEffect(_) | WorkerError::Io(_) => true,
            WorkerError::RecordRefused(_) | WorkerError::ProcessingFailed(_) => false,
        };
        if transient {
            ErrorClass::Transient
        } else {
            ErrorClass::Permanent
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}
