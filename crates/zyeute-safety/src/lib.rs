//! Client for the external content safety service.
//!
//! The service is a black box: it takes one low-resolution rendition plus
//! content context and returns a verdict. Transport and protocol failures
//! are reported as errors, never as an approval.

pub mod client;
pub mod error;
pub mod types;

pub use client::{SafetyClient, SafetyClientConfig};
pub use error::{SafetyError, SafetyResult};
pub use types::{AnalyzeRequest, AnalyzeResponse};
