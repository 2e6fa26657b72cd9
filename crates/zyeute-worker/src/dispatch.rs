//! Owner notifications and best-effort side effects.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use zyeute_models::{ContentId, OwnerId, PipelineStage};
use zyeute_queue::ProgressChannel;
use zyeute_records::{ContentStore, RecordsConfig};

use crate::error::{WorkerError, WorkerResult};

/// Push channel to the content owner.
///
/// Delivery is best-effort: implementations log failures and never return them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_progress(&self, owner: &OwnerId, content: &ContentId, percent: u8, phase: &str);

    async fn send_completion(
        &self,
        owner: &OwnerId,
        content: &ContentId,
        success: bool,
        url: Option<&str>,
        message: Option<&str>,
    );

    async fn send_stage(&self, owner: &OwnerId, content: &ContentId, stage: PipelineStage) {
        self.send_progress(owner, content, stage.progress(), stage.label())
            .await
    }
}

#[async_trait]
impl Notifier for ProgressChannel {
    async fn send_progress(&self, owner: &OwnerId, content: &ContentId, percent: u8, phase: &str) {
        if let Err(e) = self.progress(owner, content.as_str(), percent, phase).await {
            warn!(owner_id = %owner, content_id = %content, "Failed to send progress: {}", e);
        }
    }

    async fn send_stage(&self, owner: &OwnerId, content: &ContentId, stage: PipelineStage) {
        if let Err(e) = self.stage(owner, content.as_str(), stage).await {
            warn!(owner_id = %owner, content_id = %content, stage = stage.as_str(), "Failed to send stage: {}", e);
        }
    }

    async fn send_completion(
        &self,
        owner: &OwnerId,
        content: &ContentId,
        success: bool,
        url: Option<&str>,
        message: Option<&str>,
    ) {
        let result = match (success, url) {
            (true, Some(url)) => self.done(owner, content.as_str(), url).await,
            _ => {
                self.failed(owner, content.as_str(), message.unwrap_or_default())
                    .await
            }
        };
        if let Err(e) = result {
            warn!(owner_id = %owner, content_id = %content, "Failed to send completion: {}", e);
        }
    }
}

/// Downstream actions that must never affect a job's outcome.
#[async_trait]
pub trait SideEffects: Send + Sync {
    async fn request_transcription(&self, content: &ContentId, media_url: &str) -> WorkerResult<()>;

    async fn post_first_comment(
        &self,
        content: &ContentId,
        summary: &str,
        tags: &[String],
    ) -> WorkerResult<()>;

    async fn auto_comment_enabled(&self, owner: &OwnerId) -> WorkerResult<bool>;
}

/// Side effects run as Supabase edge functions.
pub struct HttpSideEffects {
    http: Client,
    functions_url: String,
    service_key: String,
    records: Arc<dyn ContentStore>,
}

impl HttpSideEffects {
    pub fn new(config: &RecordsConfig, records: Arc<dyn ContentStore>) -> WorkerResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| WorkerError::side_effect(e.to_string()))?;

        Ok(Self {
            http,
            functions_url: format!("{}/functions/v1", config.base_url.trim_end_matches('/')),
            service_key: config.service_key.clone(),
            records,
        })
    }

    async fn invoke(&self, function: &str, body: serde_json::Value) -> WorkerResult<()> {
        let url = format!("{}/{}", self.functions_url, function);
        debug!(function, "Invoking edge function");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.service_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| WorkerError::side_effect(format!("{}: {}", function, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(WorkerError::side_effect(format!(
                "{} returned {}: {}",
                function, status, text
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SideEffects for HttpSideEffects {
    async fn request_transcription(&self, content: &ContentId, media_url: &str) -> WorkerResult<()> {
        self.invoke(
            "transcribe-media",
            json!({ "publicationId": content.as_str(), "mediaUrl": media_url }),
        )
        .await
    }

    async fn post_first_comment(
        &self,
        content: &ContentId,
        summary: &str,
        tags: &[String],
    ) -> WorkerResult<()> {
        self.invoke(
            "ti-guy-comment",
            json!({ "postId": content.as_str(), "summary": summary, "tags": tags }),
        )
        .await
    }

    async fn auto_comment_enabled(&self, owner: &OwnerId) -> WorkerResult<bool> {
        Ok(self.records.auto_comment_enabled(owner).await?)
    }
}
