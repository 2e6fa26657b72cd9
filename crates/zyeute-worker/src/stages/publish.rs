//! Storage publish stage.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use zyeute_models::{ContentId, PublishedUrls, Rendition, RenditionSet};
use zyeute_storage::{CachePolicy, ObjectStore, UploadOptions};

use crate::error::WorkerResult;
use crate::metrics::record_orphans;
use crate::stages::{Publication, Publisher};

const KEY_PREFIX: &str = "posts";

/// Object key for one rendition: `posts/{content_id}/{timestamp_ms}/{name}.{ext}`.
///
/// HLS renditions carry their own relative name, e.g. `hls/low/low_000.ts`.
pub fn object_key(content_id: &ContentId, timestamp_ms: i64, rendition: &Rendition) -> String {
    format!(
        "{}/{}/{}/{}",
        KEY_PREFIX,
        content_id,
        timestamp_ms,
        rendition.file_name()
    )
}

/// Log and count objects that were uploaded but will never be referenced.
pub fn report_orphans(content_id: &ContentId, keys: &[String], reason: &str) {
    if keys.is_empty() {
        return;
    }
    warn!(
        content_id = %content_id,
        orphaned_keys = ?keys,
        "{}; uploaded objects left unreferenced", reason
    );
    record_orphans(keys.len());
}

/// Uploads renditions one after another.
///
/// Each local file is removed once its upload succeeds. The first failure
/// aborts the stage; objects already uploaded stay in the bucket unreferenced
/// and their keys are logged.
pub struct StoragePublisher {
    store: Arc<dyn ObjectStore>,
}

impl StoragePublisher {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Publisher for StoragePublisher {
    async fn publish(&self, content_id: &ContentId, set: &RenditionSet) -> WorkerResult<Publication> {
        let timestamp_ms = Utc::now().timestamp_millis();
        let mut urls = PublishedUrls::default();
        let mut uploaded: Vec<String> = Vec::with_capacity(set.renditions.len());

        for rendition in &set.renditions {
            let key = object_key(content_id, timestamp_ms, rendition);
            let options = UploadOptions::new(
                rendition.content_type.as_str(),
                CachePolicy::for_path(&rendition.path).header(),
            );

            match self.store.upload(&rendition.path, &key, &options).await {
                Ok(url) => {
                    debug!(key = %key, "Uploaded rendition");
                    if rendition.kind.is_addressable() {
                        urls.insert(rendition.kind, url);
                    }
                    uploaded.push(key);
                    if let Err(e) = tokio::fs::remove_file(&rendition.path).await {
                        warn!(path = %rendition.path.display(), "Failed to remove uploaded file: {}", e);
                    }
                }
                Err(e) => {
                    report_orphans(content_id, &uploaded, "Publish aborted");
                    return Err(e.into());
                }
            }
        }

        info!(content_id = %content_id, objects = uploaded.len(), "Renditions published");
        Ok(Publication {
            urls,
            keys: uploaded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex;
    use zyeute_models::{MediaKind, RenditionKind, VideoTier};
    use zyeute_storage::cache::{IMMUTABLE_CACHE_CONTROL, MANIFEST_CACHE_CONTROL};
    use zyeute_storage::{StorageError, StorageResult};

    /// Records uploads and fails once `fail_after` objects were stored.
    struct FakeStore {
        uploads: Mutex<Vec<(String, UploadOptions)>>,
        fail_after: Option<usize>,
    }

    impl FakeStore {
        fn new(fail_after: Option<usize>) -> Self {
            Self {
                uploads: Mutex::new(Vec::new()),
                fail_after,
            }
        }
    }

    #[async_trait]
    impl ObjectStore for FakeStore {
        async fn upload(&self, _local: &Path, key: &str, options: &UploadOptions) -> StorageResult<String> {
            let mut uploads = self.uploads.lock().unwrap();
            if Some(uploads.len()) == self.fail_after {
                return Err(StorageError::upload_failed("bucket unavailable", true));
            }
            uploads.push((key.to_string(), options.clone()));
            Ok(format!("https://cdn.example/{}", key))
        }

        async fn delete(&self, _key: &str) -> StorageResult<()> {
            Ok(())
        }
    }

    async fn video_set(dir: &Path) -> RenditionSet {
        let mut renditions = Vec::new();
        for tier in VideoTier::ALL {
            let path = dir.join(format!("{}.mp4", tier.as_str()));
            tokio::fs::write(&path, b"video").await.unwrap();
            renditions.push(Rendition::new(RenditionKind::Video(tier), path, "video/mp4"));
        }
        let thumb = dir.join("thumbnail.jpg");
        tokio::fs::write(&thumb, b"jpeg").await.unwrap();
        renditions.push(Rendition::new(RenditionKind::Thumbnail, thumb, "image/jpeg"));
        RenditionSet {
            media_kind: MediaKind::Video,
            renditions,
            width: 1080,
            height: 1920,
            duration: Some(10.0),
        }
    }

    #[test]
    fn test_object_key_layout() {
        let r = Rendition::new(RenditionKind::Video(VideoTier::High), "/w/high.mp4", "video/mp4");
        assert_eq!(
            object_key(&ContentId::from("post-9"), 1700000000000, &r),
            "posts/post-9/1700000000000/high.mp4"
        );
    }

    #[tokio::test]
    async fn test_publish_all_renditions() {
        let dir = tempfile::tempdir().unwrap();
        let set = video_set(dir.path()).await;
        let store = Arc::new(FakeStore::new(None));
        let publisher = StoragePublisher::new(store.clone());

        let publication = publisher.publish(&ContentId::from("post-1"), &set).await.unwrap();
        let urls = &publication.urls;

        assert_eq!(urls.len(), 4);
        assert_eq!(publication.keys.len(), 4);
        assert!(urls.primary().unwrap().ends_with("/high.mp4"));
        assert!(urls.thumbnail().unwrap().ends_with("/thumbnail.jpg"));
        let uploads = store.uploads.lock().unwrap();
        assert!(uploads
            .iter()
            .all(|(_, o)| o.cache_control == IMMUTABLE_CACHE_CONTROL));
        assert!(set.paths().all(|p| !p.exists()));
    }

    #[tokio::test]
    async fn test_failure_aborts_and_keeps_remaining_files() {
        let dir = tempfile::tempdir().unwrap();
        let set = video_set(dir.path()).await;
        let store = Arc::new(FakeStore::new(Some(2)));
        let publisher = StoragePublisher::new(store.clone());

        let err = publisher.publish(&ContentId::from("post-1"), &set).await.unwrap_err();

        assert!(err.is_transient());
        assert_eq!(store.uploads.lock().unwrap().len(), 2);
        assert!(!set.renditions[0].path.exists());
        assert!(set.renditions[2].path.exists());
    }

    #[tokio::test]
    async fn test_hls_parts_published_under_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let mut set = video_set(dir.path()).await;
        let hls = dir.path().join("hls");
        tokio::fs::create_dir_all(hls.join("high")).await.unwrap();
        for (name, content_type) in [
            ("high/high_000.ts", "video/mp2t"),
            ("high/high.m3u8", "application/vnd.apple.mpegurl"),
        ] {
            let path = hls.join(name);
            tokio::fs::write(&path, b"hls").await.unwrap();
            set.renditions.push(
                Rendition::new(RenditionKind::HlsPart, path, content_type)
                    .with_object_name(format!("hls/{}", name)),
            );
        }
        let manifest = hls.join("manifest.m3u8");
        tokio::fs::write(&manifest, b"#EXTM3U").await.unwrap();
        set.renditions.push(
            Rendition::new(RenditionKind::HlsManifest, manifest, "application/vnd.apple.mpegurl")
                .with_object_name("hls/manifest.m3u8"),
        );

        let store = Arc::new(FakeStore::new(None));
        let publisher = StoragePublisher::new(store.clone());
        let publication = publisher.publish(&ContentId::from("post-1"), &set).await.unwrap();

        assert_eq!(publication.keys.len(), 7);
        assert_eq!(publication.urls.len(), 5);
        assert!(publication.urls.hls_manifest().unwrap().ends_with("/hls/manifest.m3u8"));
        assert!(publication.urls.primary().unwrap().ends_with("/high.mp4"));
        assert!(!publication.urls.urls.values().any(|u| u.ends_with(".ts")));

        let uploads = store.uploads.lock().unwrap();
        let headers = |suffix: &str| {
            uploads
                .iter()
                .find(|(k, _)| k.ends_with(suffix))
                .map(|(_, o)| o.cache_control.clone())
                .unwrap()
        };
        assert_eq!(headers("/hls/manifest.m3u8"), MANIFEST_CACHE_CONTROL);
        assert_eq!(headers("/hls/high/high.m3u8"), MANIFEST_CACHE_CONTROL);
        assert_eq!(headers("/hls/high/high_000.ts"), IMMUTABLE_CACHE_CONTROL);
        let segment = uploads
            .iter()
            .find(|(k, _)| k.ends_with("/hls/high/high_000.ts"))
            .unwrap();
        assert!(segment.0.starts_with("posts/post-1/"));
        assert_eq!(segment.1.content_type, "video/mp2t");
    }
}
