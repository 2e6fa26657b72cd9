//! Pipeline stages and the seams the orchestrator drives them through.

pub mod publish;
pub mod recorder;
pub mod safety;
pub mod transform;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use zyeute_models::{
    ContentId, MediaKind, PublishedUrls, Rendition, RenditionSet, SafetyVerdict,
};
use zyeute_queue::QueueJob;

use crate::error::WorkerResult;

pub use publish::{report_orphans, StoragePublisher};
pub use recorder::StateRecorder;
pub use safety::ServiceSafetyGate;
pub use transform::FfmpegTransformer;

/// Downloaded and validated source file.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMedia {
    pub kind: MediaKind,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Seconds, videos only
    pub duration: Option<f64>,
    pub size_bytes: u64,
}

/// Download, validate and render the source.
///
/// Split in two so progress can be reported between the steps.
#[async_trait]
pub trait MediaTransformer: Send + Sync {
    async fn fetch(&self, job: &QueueJob, workspace: &Path) -> WorkerResult<SourceMedia>;

    /// Render every rendition for the job. The source file is consumed.
    async fn render(
        &self,
        job: &QueueJob,
        source: SourceMedia,
        workspace: &Path,
    ) -> WorkerResult<RenditionSet>;
}

/// Result of screening one rendition.
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    Approved(SafetyVerdict),
    Rejected(SafetyVerdict),
    /// The service could not produce a verdict
    Undetermined(String),
}

/// Context sent along with the screened rendition.
#[derive(Debug, Clone)]
pub struct ScreeningRequest {
    pub content_id: ContentId,
    pub media_kind: MediaKind,
    pub caption: Option<String>,
}

impl ScreeningRequest {
    pub fn for_job(job: &QueueJob) -> Self {
        Self {
            content_id: job.content_id().clone(),
            media_kind: job.media_kind(),
            caption: job.caption().map(str::to_string),
        }
    }
}

#[async_trait]
pub trait SafetyGate: Send + Sync {
    /// Never fails: technical problems come back as [`GateOutcome::Undetermined`].
    async fn inspect(&self, rendition: &Rendition, request: &ScreeningRequest) -> GateOutcome;
}

/// Objects written by a successful publish.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Publication {
    /// URLs of addressable renditions, as recorded on the content row
    pub urls: PublishedUrls,
    /// Every object key uploaded, including streaming parts
    pub keys: Vec<String>,
}

/// Upload a rendition set and return what was published.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, content_id: &ContentId, set: &RenditionSet) -> WorkerResult<Publication>;
}
