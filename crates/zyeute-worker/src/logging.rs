//! Structured job logging utilities.
//!
//! Events are emitted inside the attempt span from [`JobLogger::create_span`],
//! so the identifiers are attached once there rather than on every line.

use tracing::{error, info, warn, Span};

use zyeute_models::{ContentId, JobId, MediaKind};

#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    content_id: String,
    attempt: u32,
}

impl JobLogger {
    pub fn new(job_id: &JobId, content_id: &ContentId, attempt: u32) -> Self {
        Self {
            job_id: job_id.to_string(),
            content_id: content_id.to_string(),
            attempt,
        }
    }

    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            content_id = %self.content_id,
            attempt = self.attempt
        )
    }

    pub fn log_start(&self, kind: MediaKind) {
        if self.attempt > 1 {
            info!(media_kind = kind.as_str(), "Job redelivered (attempt {})", self.attempt);
        } else {
            info!(media_kind = kind.as_str(), "Job started");
        }
    }

    pub fn log_warning(&self, message: &str) {
        warn!("Job warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!("Job error: {}", message);
    }

    pub fn log_completion(&self, primary_url: &str) {
        info!(primary_url, "Job completed");
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}
