//! Streaming HTTP download of uploaded sources.

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

/// Download client configuration.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub connect_timeout: Duration,
    /// Upper bound on the whole transfer
    pub timeout: Duration,
    /// Transfers larger than this are aborted
    pub max_bytes: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(120),
            max_bytes: 100 * 1024 * 1024,
        }
    }
}

impl DownloadConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            connect_timeout: std::env::var("DOWNLOAD_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            timeout: std::env::var("DOWNLOAD_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_bytes: std::env::var("MEDIA_MAX_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_bytes),
        }
    }
}

/// HTTP downloader writing sources straight to disk.
#[derive(Debug, Clone)]
pub struct Downloader {
    http: reqwest::Client,
    config: DownloadConfig,
}

impl Downloader {
    pub fn new(config: DownloadConfig) -> MediaResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .build()
            .map_err(|e| MediaError::internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    /// Download `url` into `dest`, returning the number of bytes written.
    ///
    /// A partially written file is removed before an error is returned.
    pub async fn fetch(&self, url: &str, dest: &Path) -> MediaResult<u64> {
        let result = self.fetch_inner(url, dest).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(dest).await;
        }
        result
    }

    async fn fetch_inner(&self, url: &str, dest: &Path) -> MediaResult<u64> {
        debug!("Downloading {} to {}", url, dest.display());

        let response = self.http.get(url).send().await.map_err(classify_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::DownloadStatus {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unexpected status").to_string(),
            });
        }

        if let Some(len) = response.content_length() {
            if len > self.config.max_bytes {
                return Err(MediaError::resource_limit(format!(
                    "source is {} bytes, max {}",
                    len, self.config.max_bytes
                )));
            }
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(classify_reqwest)?;
            written += chunk.len() as u64;
            if written > self.config.max_bytes {
                return Err(MediaError::resource_limit(format!(
                    "source exceeds {} bytes",
                    self.config.max_bytes
                )));
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        info!("Downloaded {} bytes from {}", written, url);
        Ok(written)
    }
}

fn classify_reqwest(e: reqwest::Error) -> MediaError {
    if e.is_timeout() {
        return MediaError::DownloadNetwork(format!("timed out: {e}"));
    }
    if let Some(status) = e.status() {
        return MediaError::DownloadStatus {
            status: status.as_u16(),
            message: e.to_string(),
        };
    }
    if e.is_builder() {
        return MediaError::invalid_media(format!("bad source url: {e}"));
    }
    MediaError::DownloadNetwork(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn downloader(max_bytes: u64) -> Downloader {
        Downloader::new(DownloadConfig {
            max_bytes,
            timeout: Duration::from_secs(5),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_writes_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/clip.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 1024]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("source");
        let n = downloader(1 << 20)
            .fetch(&format!("{}/clip.mp4", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(n, 1024);
        assert_eq!(tokio::fs::read(&dest).await.unwrap().len(), 1024);
    }

    #[tokio::test]
    async fn test_status_classification() {
        let server = MockServer::start().await;
        Mock::given(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let d = downloader(1 << 20);

        let gone = d
            .fetch(&format!("{}/gone", server.uri()), &dir.path().join("a"))
            .await
            .unwrap_err();
        assert!(!gone.is_transient());

        let flaky = d
            .fetch(&format!("{}/flaky", server.uri()), &dir.path().join("b"))
            .await
            .unwrap_err();
        assert!(flaky.is_transient());
    }

    #[tokio::test]
    async fn test_oversized_source_rejected_and_removed() {
        let server = MockServer::start().await;
        Mock::given(path("/big"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 4096]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("big");
        let err = downloader(1024)
            .fetch(&format!("{}/big", server.uri()), &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::ResourceLimit(_)));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transient() {
        let dir = tempfile::tempdir().unwrap();
        let err = downloader(1024)
            .fetch("http://127.0.0.1:9/clip.mp4", &dir.path().join("x"))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
