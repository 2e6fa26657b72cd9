//! Job types for the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use zyeute_models::{ContentId, JobId, MediaKind, OwnerId, VisualFilter};

use crate::error::QueueResult;

fn validate_content_id(id: &ContentId) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::new("empty_content_id"));
    }
    Ok(())
}

fn validate_owner_id(id: &OwnerId) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::new("empty_owner_id"));
    }
    Ok(())
}

fn validate_http_scheme(url: &str) -> Result<(), ValidationError> {
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(())
    } else {
        Err(ValidationError::new("unsupported_scheme"))
    }
}

/// Job to process an uploaded video into three tiers and a thumbnail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct VideoJob {
    /// Unique job ID
    pub job_id: JobId,
    /// Content record this job writes to
    #[validate(custom(function = "validate_content_id"))]
    pub content_id: ContentId,
    /// Owner of the content
    #[validate(custom(function = "validate_owner_id"))]
    pub owner_id: OwnerId,
    /// Where the uploaded source can be fetched from
    #[validate(url, custom(function = "validate_http_scheme"))]
    pub source_url: String,
    #[serde(default)]
    pub visual_filter: VisualFilter,
    /// Caption typed by the owner, passed to the safety service as context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2200))]
    pub caption: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

impl VideoJob {
    pub fn new(
        content_id: impl Into<ContentId>,
        owner_id: impl Into<OwnerId>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            content_id: content_id.into(),
            owner_id: owner_id.into(),
            source_url: source_url.into(),
            visual_filter: VisualFilter::None,
            caption: None,
            enqueued_at: Utc::now(),
        }
    }

    pub fn with_filter(mut self, filter: VisualFilter) -> Self {
        self.visual_filter = filter;
        self
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }
}

/// Job to process an uploaded image (filter, normalize, re-encode) plus a thumbnail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ImageJob {
    pub job_id: JobId,
    #[validate(custom(function = "validate_content_id"))]
    pub content_id: ContentId,
    #[validate(custom(function = "validate_owner_id"))]
    pub owner_id: OwnerId,
    #[validate(url, custom(function = "validate_http_scheme"))]
    pub source_url: String,
    #[serde(default)]
    pub visual_filter: VisualFilter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2200))]
    pub caption: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

impl ImageJob {
    pub fn new(
        content_id: impl Into<ContentId>,
        owner_id: impl Into<OwnerId>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            content_id: content_id.into(),
            owner_id: owner_id.into(),
            source_url: source_url.into(),
            visual_filter: VisualFilter::None,
            caption: None,
            enqueued_at: Utc::now(),
        }
    }

    pub fn with_filter(mut self, filter: VisualFilter) -> Self {
        self.visual_filter = filter;
        self
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }
}

/// Job envelope stored in the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueJob {
    Video(VideoJob),
    Image(ImageJob),
}

impl QueueJob {
    pub fn job_id(&self) -> &JobId {
        match self {
            QueueJob::Video(j) => &j.job_id,
            QueueJob::Image(j) => &j.job_id,
        }
    }

    pub fn content_id(&self) -> &ContentId {
        match self {
            QueueJob::Video(j) => &j.content_id,
            QueueJob::Image(j) => &j.content_id,
        }
    }

    pub fn owner_id(&self) -> &OwnerId {
        match self {
            QueueJob::Video(j) => &j.owner_id,
            QueueJob::Image(j) => &j.owner_id,
        }
    }

    pub fn source_url(&self) -> &str {
        match self {
            QueueJob::Video(j) => &j.source_url,
            QueueJob::Image(j) => &j.source_url,
        }
    }

    pub fn visual_filter(&self) -> VisualFilter {
        match self {
            QueueJob::Video(j) => j.visual_filter,
            QueueJob::Image(j) => j.visual_filter,
        }
    }

    pub fn caption(&self) -> Option<&str> {
        match self {
            QueueJob::Video(j) => j.caption.as_deref(),
            QueueJob::Image(j) => j.caption.as_deref(),
        }
    }

    pub fn media_kind(&self) -> MediaKind {
        match self {
            QueueJob::Video(_) => MediaKind::Video,
            QueueJob::Image(_) => MediaKind::Image,
        }
    }

    /// Key used to reject a second enqueue of the same job.
    pub fn idempotency_key(&self) -> String {
        format!("{}:{}", self.media_kind().as_str(), self.job_id())
    }

    /// Validate the payload at the queue boundary.
    pub fn validate(&self) -> QueueResult<()> {
        match self {
            QueueJob::Video(j) => j.validate()?,
            QueueJob::Image(j) => j.validate()?,
        }
        Ok(())
    }

    /// Parse and validate a raw payload read from the transport.
    pub fn from_payload(payload: &str) -> QueueResult<Self> {
        let job: QueueJob = serde_json::from_str(payload)?;
        job.validate()?;
        Ok(job)
    }
}

impl From<VideoJob> for QueueJob {
    fn from(job: VideoJob) -> Self {
        QueueJob::Video(job)
    }
}

impl From<ImageJob> for QueueJob {
    fn from(job: ImageJob) -> Self {
        QueueJob::Image(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_serialization() {
        let job: QueueJob = VideoJob::new("c1", "u1", "https://cdn.example.com/a.mp4")
            .with_filter(VisualFilter::Noir)
            .into();
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["type"], "video");
        assert_eq!(json["content_id"], "c1");
        assert_eq!(json["visual_filter"], "noir");

        let back: QueueJob = serde_json::from_value(json).unwrap();
        assert_eq!(back, job);
    }

    #[test]
    fn test_valid_jobs_pass() {
        let job: QueueJob = ImageJob::new("c1", "u1", "https://cdn.example.com/a.png").into();
        assert!(job.validate().is_ok());
        assert_eq!(job.media_kind(), MediaKind::Image);
    }

    #[test]
    fn test_invalid_jobs_rejected() {
        let empty_content: QueueJob = VideoJob::new("", "u1", "https://cdn.example.com/a.mp4").into();
        assert!(empty_content.validate().is_err());

        let bad_scheme: QueueJob = VideoJob::new("c1", "u1", "ftp://cdn.example.com/a.mp4").into();
        assert!(bad_scheme.validate().is_err());

        let not_a_url: QueueJob = VideoJob::new("c1", "u1", "not a url").into();
        assert!(not_a_url.validate().is_err());
    }

    #[test]
    fn test_from_payload_rejects_unknown_kind() {
        let payload = r#"{"type":"audio","job_id":"j","content_id":"c","owner_id":"u","source_url":"https://x/y","enqueued_at":"2024-01-01T00:00:00Z"}"#;
        assert!(QueueJob::from_payload(payload).is_err());
    }

    #[test]
    fn test_from_payload_tolerates_unknown_filter() {
        let payload = r#"{"type":"image","job_id":"j","content_id":"c","owner_id":"u","source_url":"https://x/y.png","visual_filter":"sparkles","enqueued_at":"2024-01-01T00:00:00Z"}"#;
        let job = QueueJob::from_payload(payload).unwrap();
        assert!(job.visual_filter().is_none());
    }
}
