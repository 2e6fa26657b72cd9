//! Per-job state machine.
//!
//! `Queued -> Downloading -> Transcoding -> Scouting -> Uploading ->
//! Finalizing -> Completed | Failed`. Every transition emits a progress
//! notification; only this module decides between ack, retry and dead letter.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::Instrument;

use zyeute_models::{
    ContentId, JobId, MediaKind, PipelineStage, PublishedUrls, RenditionSet, SafetyVerdict,
};
use zyeute_queue::{Delivery, QueueJob};
use zyeute_records::ContentStore;

use crate::config::{UndeterminedPolicy, WorkerConfig};
use crate::detached::DetachedTasks;
use crate::dispatch::{Notifier, SideEffects};
use crate::error::{ErrorClass, WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics::{record_job, record_stage};
use crate::stages::{
    report_orphans, GateOutcome, MediaTransformer, Publication, Publisher, SafetyGate,
    ScreeningRequest, StateRecorder,
};
use crate::workspace::JobWorkspace;

/// Message shown to the owner for failures that are not a policy decision.
pub const GENERIC_FAILURE_MESSAGE: &str = "something went wrong, we're looking into it";

pub fn rejection_message(reason: &str) -> String {
    format!("rejected for policy reasons: {}", reason)
}

/// Everything a job attempt needs, shared across workers.
pub struct PipelineContext {
    pub config: WorkerConfig,
    pub transformer: Arc<dyn MediaTransformer>,
    pub gate: Arc<dyn SafetyGate>,
    pub publisher: Arc<dyn Publisher>,
    pub store: Arc<dyn ContentStore>,
    pub notifier: Arc<dyn Notifier>,
    pub side_effects: Arc<dyn SideEffects>,
    pub detached: DetachedTasks,
}

/// How the broker should settle the delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    Retry(Duration),
    DeadLetter(String),
}

/// What happened to the content in this attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed { primary_url: String },
    Rejected { reason: String },
    /// Transient failure; another attempt will follow
    Retrying { error: String },
    Failed { class: ErrorClass, error: String },
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Completed { .. } => "completed",
            JobOutcome::Rejected { .. } => "rejected",
            JobOutcome::Retrying { .. } => "retrying",
            JobOutcome::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub job_id: JobId,
    pub content_id: ContentId,
    pub attempt: u32,
    pub outcome: JobOutcome,
    pub disposition: Disposition,
}

/// End of a pipeline run that did not error.
enum Finished {
    Published {
        urls: PublishedUrls,
        verdict: SafetyVerdict,
        screened: bool,
    },
    Rejected(SafetyVerdict),
}

#[derive(Clone)]
pub struct Orchestrator {
    ctx: Arc<PipelineContext>,
}

impl Orchestrator {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<PipelineContext> {
        &self.ctx
    }

    /// Run one delivery to a terminal decision.
    pub async fn run(&self, delivery: &Delivery) -> JobReport {
        let job = &delivery.job;
        let logger = JobLogger::new(job.job_id(), job.content_id(), delivery.attempt);
        let span = logger.create_span();

        let report = self.run_attempt(job, delivery.attempt, &logger).instrument(span).await;
        record_job(report.outcome.as_str());
        report
    }

    async fn run_attempt(&self, job: &QueueJob, attempt: u32, logger: &JobLogger) -> JobReport {
        logger.log_start(job.media_kind());
        let mut recorder = StateRecorder::new(Arc::clone(&self.ctx.store), job.content_id().clone());

        let result = match JobWorkspace::create(&self.ctx.config.work_dir, job.job_id(), attempt).await {
            Ok(workspace) => {
                let result = self.execute(job, &workspace, &mut recorder).await;
                workspace.cleanup().await;
                result
            }
            Err(e) => Err(WorkerError::from(e)),
        };

        let (outcome, disposition) = match result {
            Ok(Finished::Published {
                urls,
                verdict,
                screened,
            }) => self.on_published(job, urls, verdict, screened, logger).await,
            Ok(Finished::Rejected(verdict)) => {
                self.on_rejected(job, &mut recorder, verdict, logger).await
            }
            Err(e) => self.on_error(job, attempt, &mut recorder, e, logger).await,
        };

        JobReport {
            job_id: job.job_id().clone(),
            content_id: job.content_id().clone(),
            attempt,
            outcome,
            disposition,
        }
    }

    async fn execute(
        &self,
        job: &QueueJob,
        workspace: &JobWorkspace,
        recorder: &mut StateRecorder,
    ) -> WorkerResult<Finished> {
        let ctx = &self.ctx;

        recorder.mark_processing().await?;
        self.enter(job, PipelineStage::Downloading).await;
        let source = timed(
            PipelineStage::Downloading,
            ctx.transformer.fetch(job, workspace.path()),
        )
        .await?;

        self.enter(job, PipelineStage::Transcoding).await;
        let set = timed(
            PipelineStage::Transcoding,
            ctx.transformer.render(job, source, workspace.path()),
        )
        .await?;
        if !set.is_complete() {
            return Err(WorkerError::processing_failed("rendition set is incomplete"));
        }

        self.enter(job, PipelineStage::Scouting).await;
        let screened_rendition = set
            .screening_rendition()
            .ok_or_else(|| WorkerError::processing_failed("no rendition to screen"))?;
        let request = ScreeningRequest::for_job(job);
        let started = Instant::now();
        let outcome = ctx.gate.inspect(screened_rendition, &request).await;
        record_stage(PipelineStage::Scouting.as_str(), started.elapsed());

        let (verdict, screened) = match outcome {
            GateOutcome::Approved(verdict) => (verdict, true),
            GateOutcome::Rejected(verdict) => {
                recorder.record_safety(&verdict).await?;
                return Ok(Finished::Rejected(verdict));
            }
            GateOutcome::Undetermined(reason) => match ctx.config.undetermined_policy {
                UndeterminedPolicy::Approve => {
                    tracing::warn!(reason = %reason, "Safety undetermined, continuing per policy");
                    (SafetyVerdict::undetermined_pass(), false)
                }
                UndeterminedPolicy::Reject => {
                    return Err(WorkerError::SafetyUndetermined {
                        reason,
                        retryable: false,
                    })
                }
                UndeterminedPolicy::Retry => {
                    return Err(WorkerError::SafetyUndetermined {
                        reason,
                        retryable: true,
                    })
                }
            },
        };
        recorder.record_safety(&verdict).await?;

        self.enter(job, PipelineStage::Uploading).await;
        let publication = timed(
            PipelineStage::Uploading,
            ctx.publisher.publish(job.content_id(), &set),
        )
        .await?;

        self.enter(job, PipelineStage::Finalizing).await;
        let started = Instant::now();
        if let Err(e) = finalize(recorder, &publication, &set).await {
            report_orphans(job.content_id(), &publication.keys, "Finalizing failed");
            return Err(e);
        }
        record_stage(PipelineStage::Finalizing.as_str(), started.elapsed());

        Ok(Finished::Published {
            urls: publication.urls,
            verdict,
            screened,
        })
    }

    async fn enter(&self, job: &QueueJob, stage: PipelineStage) {
        tracing::debug!(stage = stage.as_str(), "Entering stage");
        self.ctx
            .notifier
            .send_stage(job.owner_id(), job.content_id(), stage)
            .await;
    }

    async fn on_published(
        &self,
        job: &QueueJob,
        urls: PublishedUrls,
        verdict: SafetyVerdict,
        screened: bool,
        logger: &JobLogger,
    ) -> (JobOutcome, Disposition) {
        let primary_url = urls.primary().unwrap_or_default().to_string();

        if job.media_kind() == MediaKind::Video && !primary_url.is_empty() {
            let effects = Arc::clone(&self.ctx.side_effects);
            let content_id = job.content_id().clone();
            let media_url = primary_url.clone();
            self.ctx.detached.spawn("transcription", async move {
                effects.request_transcription(&content_id, &media_url).await
            });
        }

        if screened {
            let effects = Arc::clone(&self.ctx.side_effects);
            let content_id = job.content_id().clone();
            let owner_id = job.owner_id().clone();
            self.ctx.detached.spawn("first_comment", async move {
                if !effects.auto_comment_enabled(&owner_id).await? {
                    tracing::debug!(owner_id = %owner_id, "Automated comment disabled by owner");
                    return Ok(());
                }
                effects
                    .post_first_comment(&content_id, &verdict.summary, &verdict.tags)
                    .await
            });
        }

        self.enter(job, PipelineStage::Completed).await;
        self.ctx
            .notifier
            .send_completion(
                job.owner_id(),
                job.content_id(),
                true,
                Some(primary_url.as_str()),
                None,
            )
            .await;

        logger.log_completion(&primary_url);
        (JobOutcome::Completed { primary_url }, Disposition::Ack)
    }

    async fn on_rejected(
        &self,
        job: &QueueJob,
        recorder: &mut StateRecorder,
        verdict: SafetyVerdict,
        logger: &JobLogger,
    ) -> (JobOutcome, Disposition) {
        logger.log_warning(&format!("content rejected: {}", verdict.reason));
        if let Err(e) = recorder.finish_failed().await {
            logger.log_error(&format!("failed to record rejection: {}", e));
        }
        self.ctx
            .notifier
            .send_completion(
                job.owner_id(),
                job.content_id(),
                false,
                None,
                Some(&rejection_message(&verdict.reason)),
            )
            .await;

        (
            JobOutcome::Rejected {
                reason: verdict.reason,
            },
            Disposition::Ack,
        )
    }

    async fn on_error(
        &self,
        job: &QueueJob,
        attempt: u32,
        recorder: &mut StateRecorder,
        error: WorkerError,
        logger: &JobLogger,
    ) -> (JobOutcome, Disposition) {
        let class = error.class();
        let message = error.to_string();

        if class == ErrorClass::Transient && attempt < self.ctx.config.max_attempts {
            let delay = self.ctx.config.backoff().delay_for_attempt(attempt);
            logger.log_warning(&format!(
                "transient failure, retrying in {:?}: {}",
                delay, message
            ));
            return (JobOutcome::Retrying { error: message }, Disposition::Retry(delay));
        }

        logger.log_error(&format!("{} failure: {}", class.as_str(), message));
        if let Err(e) = recorder.finish_failed().await {
            logger.log_error(&format!("failed to record failure: {}", e));
        }
        self.ctx
            .notifier
            .send_completion(
                job.owner_id(),
                job.content_id(),
                false,
                None,
                Some(GENERIC_FAILURE_MESSAGE),
            )
            .await;

        (
            JobOutcome::Failed {
                class,
                error: message.clone(),
            },
            Disposition::DeadLetter(message),
        )
    }
}

/// Point the record at the published renditions and mark it completed.
async fn finalize(
    recorder: &mut StateRecorder,
    publication: &Publication,
    set: &RenditionSet,
) -> WorkerResult<()> {
    recorder.record_urls(&publication.urls, set).await?;
    recorder.mark_completed().await
}

async fn timed<T>(stage: PipelineStage, fut: impl Future<Output = T>) -> T {
    let started = Instant::now();
    let result = fut.await;
    record_stage(stage.as_str(), started.elapsed());
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        assert_eq!(rejection_message("hate"), "rejected for policy reasons: hate");
        assert!(!GENERIC_FAILURE_MESSAGE.contains("policy"));
    }

    #[test]
    fn test_outcome_labels() {
        let outcome = JobOutcome::Failed {
            class: ErrorClass::Permanent,
            error: "bad input".into(),
        };
        assert_eq!(outcome.as_str(), "failed");
        assert_eq!(
            JobOutcome::Completed {
                primary_url: "u".into()
            }
            .as_str(),
            "completed"
        );
    }
}
