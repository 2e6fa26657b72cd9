//! Safety service HTTP client.

use std::path::Path;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use zyeute_models::{MediaKind, SafetyVerdict};

use crate::error::{SafetyError, SafetyResult};
use crate::types::{AnalyzeRequest, AnalyzeResponse};

/// Configuration for the safety client.
#[derive(Debug, Clone)]
pub struct SafetyClientConfig {
    /// Base URL of the safety service
    pub base_url: String,
    /// Bearer token, if the service requires one
    pub api_key: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Retries inside one call, on top of the pipeline's own retries
    pub max_retries: u32,
}

impl Default for SafetyClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002".to_string(),
            api_key: None,
            timeout: Duration::from_secs(60),
            max_retries: 1,
        }
    }
}

impl SafetyClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("SAFETY_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8002".to_string()),
            api_key: std::env::var("SAFETY_SERVICE_API_KEY").ok().filter(|k| !k.is_empty()),
            timeout: Duration::from_secs(
                std::env::var("SAFETY_SERVICE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            max_retries: std::env::var("SAFETY_SERVICE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1),
        }
    }
}

/// Client for the content safety service.
pub struct SafetyClient {
    http: Client,
    config: SafetyClientConfig,
}

impl SafetyClient {
    /// Create a new safety client.
    pub fn new(config: SafetyClientConfig) -> SafetyResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(SafetyError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> SafetyResult<Self> {
        Self::new(SafetyClientConfig::from_env())
    }

    /// Check if the safety service is up.
    pub async fn health_check(&self) -> SafetyResult<bool> {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => Ok(true),
            Ok(response) => {
                warn!("Safety service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Safety service health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// Analyze one rendition file.
    pub async fn analyze_file(
        &self,
        content_id: &str,
        media_kind: MediaKind,
        path: &Path,
        mime_type: &str,
        caption: Option<&str>,
    ) -> SafetyResult<SafetyVerdict> {
        let bytes = tokio::fs::read(path).await?;
        let request = AnalyzeRequest {
            content_id: content_id.to_string(),
            media_kind,
            mime_type: mime_type.to_string(),
            data: BASE64.encode(&bytes),
            caption: caption.map(str::to_string),
        };
        self.analyze(&request).await
    }

    /// Send an analysis request.
    pub async fn analyze(&self, request: &AnalyzeRequest) -> SafetyResult<SafetyVerdict> {
        let url = format!("{}/analyze", self.config.base_url);

        debug!(content_id = %request.content_id, "Sending safety analysis request to {}", url);

        let response = self
            .with_retry(|| async {
                let mut req = self.http.post(&url).json(request);
                if let Some(key) = &self.config.api_key {
                    req = req.bearer_auth(key);
                }
                let response = req.send().await.map_err(|e| {
                    if e.is_timeout() {
                        SafetyError::Timeout(self.config.timeout.as_secs())
                    } else {
                        SafetyError::Network(e)
                    }
                })?;

                let status = response.status();
                if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                    return Err(SafetyError::ServiceUnavailable(format!(
                        "safety service returned {}",
                        status
                    )));
                }
                Ok(response)
            })
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SafetyError::RequestFailed(format!(
                "safety service returned {}: {}",
                status, body
            )));
        }

        let body = response.text().await?;
        let parsed: AnalyzeResponse = serde_json::from_str(&body)
            .map_err(|e| SafetyError::InvalidResponse(e.to_string()))?;

        Ok(parsed.into())
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> SafetyResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = SafetyResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    warn!(
                        "Safety request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: String) -> SafetyClient {
        SafetyClient::new(SafetyClientConfig {
            base_url,
            api_key: Some("secret".to_string()),
            timeout: Duration::from_secs(2),
            max_retries: 1,
        })
        .unwrap()
    }

    fn request() -> AnalyzeRequest {
        AnalyzeRequest {
            content_id: "c1".to_string(),
            media_kind: MediaKind::Video,
            mime_type: "video/mp4".to_string(),
            data: BASE64.encode(b"frames"),
            caption: None,
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = SafetyClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.api_key.is_none());
    }

    #[tokio::test]
    async fn test_approved_verdict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "approved": true,
                "summary": "Tempête de neige à Québec",
                "tags": ["hiver", "quebec"],
                "vibe_category": "cozy"
            })))
            .mount(&server)
            .await;

        let verdict = client(server.uri()).analyze(&request()).await.unwrap();
        assert!(verdict.approved);
        assert_eq!(verdict.tags, vec!["hiver", "quebec"]);
    }

    #[tokio::test]
    async fn test_rejected_verdict_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(path("/analyze"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"approved": false, "reason": "hate"})),
            )
            .mount(&server)
            .await;

        let verdict = client(server.uri()).analyze(&request()).await.unwrap();
        assert!(!verdict.approved);
        assert_eq!(verdict.reason, "hate");
    }

    #[tokio::test]
    async fn test_server_error_retried_then_reported() {
        let server = MockServer::start().await;
        Mock::given(path("/analyze"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let err = client(server.uri()).analyze(&request()).await.unwrap_err();
        assert!(matches!(err, SafetyError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_garbage_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client(server.uri()).analyze(&request()).await.unwrap_err();
        assert!(matches!(err, SafetyError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_timeout_reported() {
        let server = MockServer::start().await;
        Mock::given(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let c = SafetyClient::new(SafetyClientConfig {
            base_url: server.uri(),
            timeout: Duration::from_millis(200),
            max_retries: 0,
            ..Default::default()
        })
        .unwrap();
        let err = c.analyze(&request()).await.unwrap_err();
        assert!(matches!(err, SafetyError::Timeout(_)));
    }
}
