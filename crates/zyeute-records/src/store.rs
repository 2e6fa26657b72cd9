//! Content store abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use zyeute_models::{ContentId, OwnerId, ProcessingStatus, PublishedUrls, SafetyVerdict};

use crate::error::RecordsResult;
use crate::types::MediaMetadata;

/// Writes pipeline results to the content record.
///
/// Implementations issue blind writes; ordering rules (forward-only status,
/// single terminal write) are enforced by the caller.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn update_status(&self, content_id: &ContentId, status: ProcessingStatus) -> RecordsResult<()>;

    /// Persist `safety_flags`, `ai_description` and `ai_labels`.
    async fn update_safety(
        &self,
        content_id: &ContentId,
        verdict: &SafetyVerdict,
        checked_at: DateTime<Utc>,
    ) -> RecordsResult<()>;

    async fn update_rendition_urls(
        &self,
        content_id: &ContentId,
        urls: &PublishedUrls,
        metadata: &MediaMetadata,
    ) -> RecordsResult<()>;

    /// Whether the owner wants the automated first comment on their posts.
    async fn auto_comment_enabled(&self, owner_id: &OwnerId) -> RecordsResult<bool>;
}
