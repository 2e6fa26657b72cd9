//! State recorder: ordered writes to the content record for one attempt.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error};

use zyeute_models::{ContentId, ProcessingStatus, PublishedUrls, RenditionSet, SafetyVerdict};
use zyeute_records::{ContentStore, MediaMetadata};

use crate::error::{WorkerError, WorkerResult};

/// Guards the content record against out-of-order writes.
///
/// Status only moves forward, a terminal status is written at most once and
/// the safety verdict at most once. Refused writes are logged and returned as
/// [`WorkerError::RecordRefused`].
pub struct StateRecorder {
    store: Arc<dyn ContentStore>,
    content_id: ContentId,
    status: ProcessingStatus,
    safety_written: bool,
}

impl StateRecorder {
    pub fn new(store: Arc<dyn ContentStore>, content_id: ContentId) -> Self {
        Self {
            store,
            content_id,
            status: ProcessingStatus::Pending,
            safety_written: false,
        }
    }

    /// Last status written by this recorder.
    pub fn status(&self) -> ProcessingStatus {
        self.status
    }

    pub async fn mark_processing(&mut self) -> WorkerResult<()> {
        self.transition(ProcessingStatus::Processing).await
    }

    pub async fn mark_completed(&mut self) -> WorkerResult<()> {
        self.transition(ProcessingStatus::Completed).await
    }

    pub async fn mark_failed(&mut self) -> WorkerResult<()> {
        self.transition(ProcessingStatus::Failed).await
    }

    /// Drive the record to `failed` from wherever this attempt stopped.
    ///
    /// An attempt that failed before `processing` was written walks through
    /// it first, so the record never stays `pending` after a terminal failure.
    pub async fn finish_failed(&mut self) -> WorkerResult<()> {
        if self.status == ProcessingStatus::Pending {
            self.mark_processing().await?;
        }
        self.mark_failed().await
    }

    pub async fn record_safety(&mut self, verdict: &SafetyVerdict) -> WorkerResult<()> {
        if self.safety_written {
            return Err(self.refuse("safety verdict already recorded"));
        }
        self.store
            .update_safety(&self.content_id, verdict, Utc::now())
            .await?;
        self.safety_written = true;
        Ok(())
    }

    pub async fn record_urls(&mut self, urls: &PublishedUrls, set: &RenditionSet) -> WorkerResult<()> {
        if self.status.is_terminal() {
            return Err(self.refuse("record is already terminal"));
        }
        let metadata = MediaMetadata {
            width: set.width,
            height: set.height,
            duration: set.duration,
        };
        self.store
            .update_rendition_urls(&self.content_id, urls, &metadata)
            .await?;
        Ok(())
    }

    async fn transition(&mut self, next: ProcessingStatus) -> WorkerResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(self.refuse(&format!("status {} -> {}", self.status, next)));
        }
        self.store.update_status(&self.content_id, next).await?;
        debug!(content_id = %self.content_id, from = %self.status, to = %next, "Status recorded");
        self.status = next;
        Ok(())
    }

    fn refuse(&self, what: &str) -> WorkerError {
        error!(content_id = %self.content_id, "Refused record update: {}", what);
        WorkerError::record_refused(what)
    }
}
