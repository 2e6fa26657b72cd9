//! Supabase PostgREST client for the `posts` table.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::json;
use tracing::{debug, info_span, warn, Instrument};

use zyeute_models::{ContentId, OwnerId, ProcessingStatus, PublishedUrls, SafetyVerdict};

use crate::error::{RecordsError, RecordsResult};
use crate::store::ContentStore;
use crate::types::{rendition_patch, MediaMetadata, ProfilePreferences};

// =============================================================================
// Configuration
// =============================================================================

/// Record store configuration.
#[derive(Debug, Clone)]
pub struct RecordsConfig {
    /// Supabase project URL, e.g. `https://xyz.supabase.co`
    pub base_url: String,
    /// Service role key, sent as both `apikey` and bearer token
    pub service_key: String,
    /// Request timeout
    pub timeout: Duration,
    /// Retries inside one call for transient failures
    pub max_retries: u32,
}

impl RecordsConfig {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            timeout: Duration::from_secs(15),
            max_retries: 2,
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> RecordsResult<Self> {
        let base_url = std::env::var("SUPABASE_URL")
            .or_else(|_| std::env::var("VITE_SUPABASE_URL"))
            .map_err(|_| RecordsError::config_error("SUPABASE_URL must be set"))?;
        let service_key = std::env::var("SUPABASE_SERVICE_ROLE_KEY")
            .map_err(|_| RecordsError::config_error("SUPABASE_SERVICE_ROLE_KEY must be set"))?;

        if base_url.is_empty() || service_key.is_empty() {
            return Err(RecordsError::config_error(
                "SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY cannot be empty",
            ));
        }

        let mut config = Self::new(base_url, service_key);
        config.timeout = Duration::from_secs(
            std::env::var("RECORDS_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(15),
        );
        config.max_retries = std::env::var("RECORDS_MAX_RETRIES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2);
        Ok(config)
    }
}

// =============================================================================
// Client
// =============================================================================

/// Content record store backed by Supabase PostgREST.
#[derive(Clone)]
pub struct SupabaseRecords {
    http: Client,
    config: RecordsConfig,
}

impl SupabaseRecords {
    pub fn new(config: RecordsConfig) -> RecordsResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("zyeute-records/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(RecordsError::Network)?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> RecordsResult<Self> {
        Self::new(RecordsConfig::from_env()?)
    }

    pub fn config(&self) -> &RecordsConfig {
        &self.config
    }

    /// Check that PostgREST answers with our credentials.
    pub async fn health_check(&self) -> RecordsResult<()> {
        let response = self
            .request(Method::GET, "posts")
            .query(&[("select", "id"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        Self::check_status(response).await.map(|_| ())
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let url = format!("{}/rest/v1/{}", self.config.base_url, table);
        self.http
            .request(method, url)
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
    }

    fn map_send_error(&self, e: reqwest::Error) -> RecordsError {
        if e.is_timeout() {
            RecordsError::Timeout(self.config.timeout.as_secs())
        } else {
            RecordsError::Network(e)
        }
    }

    async fn check_status(response: Response) -> RecordsResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RecordsError::http(status.as_u16(), body))
    }

    /// PATCH one `posts` row by id. Zero matched rows is an error.
    async fn patch_post(&self, content_id: &ContentId, body: serde_json::Value) -> RecordsResult<()> {
        let filter = format!("eq.{}", content_id);
        let span = info_span!("records_patch", content_id = %content_id);

        self.with_retry("patch_post", || async {
            let response = self
                .request(Method::PATCH, "posts")
                .query(&[("id", filter.as_str()), ("select", "id")])
                .header("Prefer", "return=representation")
                .json(&body)
                .send()
                .await
                .map_err(|e| self.map_send_error(e))?;
            let response = Self::check_status(response).await?;

            let rows: Vec<serde_json::Value> = response
                .json()
                .await
                .map_err(|e| RecordsError::InvalidResponse(e.to_string()))?;
            if rows.is_empty() {
                return Err(RecordsError::NotFound(content_id.to_string()));
            }
            Ok(())
        })
        .instrument(span)
        .await
    }

    async fn with_retry<F, Fut, T>(&self, operation: &str, op: F) -> RecordsResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = RecordsResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(200 * 2u64.pow(attempt));
                    warn!(
                        operation = %operation,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Record store request failed, retrying: {}",
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

#[async_trait]
impl ContentStore for SupabaseRecords {
    async fn update_status(&self, content_id: &ContentId, status: ProcessingStatus) -> RecordsResult<()> {
        debug!(content_id = %content_id, status = status.as_str(), "Updating processing status");
        self.patch_post(content_id, json!({ "processing_status": status.as_str() }))
            .await
    }

    async fn update_safety(
        &self,
        content_id: &ContentId,
        verdict: &SafetyVerdict,
        checked_at: DateTime<Utc>,
    ) -> RecordsResult<()> {
        let mut body = json!({
            "safety_flags": verdict.to_flags(checked_at),
            "ai_labels": verdict.tags,
        });
        if !verdict.summary.is_empty() {
            body["ai_description"] = json!(verdict.summary);
        }
        self.patch_post(content_id, body).await
    }

    async fn update_rendition_urls(
        &self,
        content_id: &ContentId,
        urls: &PublishedUrls,
        metadata: &MediaMetadata,
    ) -> RecordsResult<()> {
        self.patch_post(content_id, rendition_patch(urls, metadata)).await
    }

    async fn auto_comment_enabled(&self, owner_id: &OwnerId) -> RecordsResult<bool> {
        let filter = format!("eq.{}", owner_id);
        let rows: Vec<ProfilePreferences> = self
            .with_retry("auto_comment_enabled", || async {
                let response = self
                    .request(Method::GET, "user_profiles")
                    .query(&[("id", filter.as_str()), ("select", "ti_guy_comments_enabled")])
                    .send()
                    .await
                    .map_err(|e| self.map_send_error(e))?;
                let response = Self::check_status(response).await?;
                response
                    .json()
                    .await
                    .map_err(|e| RecordsError::InvalidResponse(e.to_string()))
            })
            .await?;

        // Unknown owners get no comment; a null column means the default (on).
        Ok(rows
            .first()
            .map(|row| row.ti_guy_comments_enabled.unwrap_or(true))
            .unwrap_or(false))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: String) -> SupabaseRecords {
        let mut config = RecordsConfig::new(base_url, "service-key");
        config.timeout = Duration::from_secs(2);
        config.max_retries = 1;
        SupabaseRecords::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_update_status_patches_single_row() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/posts"))
            .and(query_param("id", "eq.post-1"))
            .and(header("apikey", "service-key"))
            .and(header("authorization", "Bearer service-key"))
            .and(body_json(json!({ "processing_status": "processing" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "post-1" }])))
            .expect(1)
            .mount(&server)
            .await;

        let records = client(server.uri());
        records
            .update_status(&ContentId::from("post-1"), ProcessingStatus::Processing)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_row_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/posts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(server.uri())
            .update_status(&ContentId::from("ghost"), ProcessingStatus::Failed)
            .await
            .unwrap_err();
        assert!(matches!(err, RecordsError::NotFound(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_server_error_is_retried_then_reported() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/posts"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .expect(2)
            .mount(&server)
            .await;

        let err = client(server.uri())
            .update_status(&ContentId::from("post-1"), ProcessingStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, RecordsError::Http { status: 503, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_update_safety_writes_flags_and_labels() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/posts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "post-1" }])))
            .expect(1)
            .mount(&server)
            .await;

        let records = client(server.uri());
        let verdict = SafetyVerdict::rejected("hate");
        records
            .update_safety(&ContentId::from("post-1"), &verdict, Utc::now())
            .await
            .unwrap();

        let received = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(body["safety_flags"]["approved"], false);
        assert_eq!(body["safety_flags"]["reason"], "hate");
        assert_eq!(body["ai_labels"], json!([]));
        assert!(body.get("ai_description").is_none());
    }

    #[tokio::test]
    async fn test_auto_comment_preference() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/user_profiles"))
            .and(query_param("id", "eq.owner-off"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{ "ti_guy_comments_enabled": false }])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/user_profiles"))
            .and(query_param("id", "eq.owner-default"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{ "ti_guy_comments_enabled": null }])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/user_profiles"))
            .and(query_param("id", "eq.nobody"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let records = client(server.uri());
        assert!(!records.auto_comment_enabled(&OwnerId::from("owner-off")).await.unwrap());
        assert!(records.auto_comment_enabled(&OwnerId::from("owner-default")).await.unwrap());
        assert!(!records.auto_comment_enabled(&OwnerId::from("nobody")).await.unwrap());
    }
}
