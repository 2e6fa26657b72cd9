//! Safety client error types.

use thiserror::Error;

pub type SafetyResult<T> = Result<T, SafetyError>;

/// Technical failures talking to the safety service.
///
/// A content rejection is not an error; it is a verdict with `approved: false`.
#[derive(Debug, Error)]
pub enum SafetyError {
    #[error("Safety service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SafetyError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SafetyError::ServiceUnavailable(_) | SafetyError::Timeout(_) | SafetyError::Network(_)
        )
    }
}
