//! Content safety gate backed by the external safety service.

use async_trait::async_trait;
use tracing::{info, warn};

use zyeute_models::Rendition;
use zyeute_safety::SafetyClient;

use crate::stages::{GateOutcome, SafetyGate, ScreeningRequest};

pub struct ServiceSafetyGate {
    client: SafetyClient,
}

impl ServiceSafetyGate {
    pub fn new(client: SafetyClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SafetyGate for ServiceSafetyGate {
    async fn inspect(&self, rendition: &Rendition, request: &ScreeningRequest) -> GateOutcome {
        let result = self
            .client
            .analyze_file(
                request.content_id.as_str(),
                request.media_kind,
                &rendition.path,
                &rendition.content_type,
                request.caption.as_deref(),
            )
            .await;

        match result {
            Ok(verdict) if verdict.approved => {
                info!(content_id = %request.content_id, tags = ?verdict.tags, "Content approved");
                GateOutcome::Approved(verdict)
            }
            Ok(verdict) => {
                warn!(content_id = %request.content_id, reason = %verdict.reason, "Content rejected");
                GateOutcome::Rejected(verdict)
            }
            Err(e) => {
                warn!(content_id = %request.content_id, "Safety verdict undetermined: {}", e);
                GateOutcome::Undetermined(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zyeute_models::{ContentId, MediaKind, RenditionKind, VideoTier};
    use zyeute_safety::SafetyClientConfig;

    fn gate(base_url: String) -> ServiceSafetyGate {
        let config = SafetyClientConfig {
            base_url,
            api_key: None,
            timeout: Duration::from_secs(2),
            max_retries: 0,
        };
        ServiceSafetyGate::new(SafetyClient::new(config).unwrap())
    }

    fn request() -> ScreeningRequest {
        ScreeningRequest {
            content_id: ContentId::from("post-1"),
            media_kind: MediaKind::Video,
            caption: Some("sugar shack".into()),
        }
    }

    async fn low_rendition(dir: &tempfile::TempDir) -> Rendition {
        let path = dir.path().join("low.mp4");
        tokio::fs::write(&path, b"low tier bytes").await.unwrap();
        Rendition::new(RenditionKind::Video(VideoTier::Low), path, "video/mp4")
    }

    #[tokio::test]
    async fn test_rejection_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "approved": false,
                "reason": "hate",
                "summary": "",
                "tags": []
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let outcome = gate(server.uri()).inspect(&low_rendition(&dir).await, &request()).await;
        match outcome {
            GateOutcome::Rejected(v) => assert_eq!(v.reason, "hate"),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_service_error_is_undetermined_not_approval() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let outcome = gate(server.uri()).inspect(&low_rendition(&dir).await, &request()).await;
        assert!(matches!(outcome, GateOutcome::Undetermined(_)));
    }
}
