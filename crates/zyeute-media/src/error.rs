//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Download failed with HTTP {status}: {message}")]
    DownloadStatus { status: u16, message: String },

    #[error("Download failed: {0}")]
    DownloadNetwork(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid media file: {0}")]
    InvalidMedia(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Resource limit exceeded: {0}")]
    ResourceLimit(String),

    #[error("Image processing failed: {0}")]
    Image(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn invalid_media(message: impl Into<String>) -> Self {
        Self::InvalidMedia(message.into())
    }

    pub fn resource_limit(message: impl Into<String>) -> Self {
        Self::ResourceLimit(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether retrying the same input could succeed.
    ///
    /// Network trouble, server-side HTTP errors, timeouts and local IO are
    /// transient. Anything that says the input itself is bad is not.
    pub fn is_transient(&self) -> bool {
        match self {
            MediaError::DownloadNetwork(_) | MediaError::Timeout(_) | MediaError::Io(_) => true,
            MediaError::DownloadStatus { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            MediaError::FfmpegNotFound
            | MediaError::FfprobeNotFound
            | MediaError::FfmpegFailed { .. }
            | MediaError::FfprobeFailed { .. }
            | MediaError::FileNotFound(_)
            | MediaError::JsonParse(_)
            | MediaError::InvalidMedia(_)
            | MediaError::UnsupportedFormat(_)
            | MediaError::ResourceLimit(_)
            | MediaError::Image(_)
            | MediaError::Internal(_) => false,
        }
    }
}

impl From<image::ImageError> for MediaError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::IoError(io) => MediaError::Io(io),
            image::ImageError::Unsupported(u) => MediaError::UnsupportedFormat(u.to_string()),
            image::ImageError::Limits(l) => MediaError::ResourceLimit(l.to_string()),
            image::ImageError::Decoding(d) => MediaError::InvalidMedia(d.to_string()),
            other => MediaError::Image(other.to_string()),
        }
    }
}
