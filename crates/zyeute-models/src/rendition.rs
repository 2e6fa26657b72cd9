//! Renditions produced by the media transform stage.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::encoding::VideoTier;

/// Kind of media a job carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Image => "image",
        }
    }
}

/// Role of one rendition inside a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RenditionKind {
    Video(VideoTier),
    /// Processed still image
    Processed,
    Thumbnail,
    /// HLS master playlist
    HlsManifest,
    /// Variant playlist or segment referenced by the HLS manifest
    HlsPart,
}

impl RenditionKind {
    /// Object name (without extension) used when publishing.
    pub fn name(&self) -> &'static str {
        match self {
            RenditionKind::Video(tier) => tier.as_str(),
            RenditionKind::Processed => "processed",
            RenditionKind::Thumbnail => "thumbnail",
            RenditionKind::HlsManifest => "hls_manifest",
            RenditionKind::HlsPart => "hls_part",
        }
    }

    /// Whether the rendition gets its own entry in [`PublishedUrls`].
    ///
    /// HLS parts are only reached through the manifest.
    pub fn is_addressable(&self) -> bool {
        !matches!(self, RenditionKind::HlsPart)
    }
}

/// One output file on local disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rendition {
    pub kind: RenditionKind,
    pub path: PathBuf,
    pub content_type: String,
    /// Object name relative to the content prefix, when it is not derived from the kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_name: Option<String>,
}

impl Rendition {
    pub fn new(kind: RenditionKind, path: impl Into<PathBuf>, content_type: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            content_type: content_type.into(),
            object_name: None,
        }
    }

    pub fn with_object_name(mut self, name: impl Into<String>) -> Self {
        self.object_name = Some(name.into());
        self
    }

    /// File extension of the local path, defaulting to `bin`.
    pub fn extension(&self) -> &str {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin")
    }

    /// Object file name, e.g. `high.mp4` or `hls/high/high_000.ts`.
    pub fn file_name(&self) -> String {
        match &self.object_name {
            Some(name) => name.clone(),
            None => format!("{}.{}", self.kind.name(), self.extension()),
        }
    }
}

/// Output of the media transform stage for one job attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenditionSet {
    pub media_kind: MediaKind,
    pub renditions: Vec<Rendition>,
    pub width: u32,
    pub height: u32,
    /// Duration in seconds; `None` for images.
    pub duration: Option<f64>,
}

impl RenditionSet {
    pub fn get(&self, kind: RenditionKind) -> Option<&Rendition> {
        self.renditions.iter().find(|r| r.kind == kind)
    }

    /// Low-resolution rendition sent to the safety service.
    pub fn screening_rendition(&self) -> Option<&Rendition> {
        match self.media_kind {
            MediaKind::Video => self
                .get(RenditionKind::Video(VideoTier::Low))
                .or_else(|| self.get(RenditionKind::Thumbnail)),
            MediaKind::Image => self
                .get(RenditionKind::Thumbnail)
                .or_else(|| self.get(RenditionKind::Processed)),
        }
    }

    /// Whether every rendition required for the media kind is present.
    pub fn is_complete(&self) -> bool {
        let required: &[RenditionKind] = match self.media_kind {
            MediaKind::Video => &[
                RenditionKind::Video(VideoTier::High),
                RenditionKind::Video(VideoTier::Medium),
                RenditionKind::Video(VideoTier::Low),
                RenditionKind::Thumbnail,
            ],
            MediaKind::Image => &[RenditionKind::Processed, RenditionKind::Thumbnail],
        };
        required.iter().all(|k| self.get(*k).is_some())
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.renditions.iter().map(|r| r.path.as_path())
    }
}

/// Public URLs of a published rendition set, keyed by rendition name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct PublishedUrls {
    pub urls: BTreeMap<String, String>,
}

impl PublishedUrls {
    pub fn insert(&mut self, kind: RenditionKind, url: impl Into<String>) {
        self.urls.insert(kind.name().to_string(), url.into());
    }

    pub fn get(&self, kind: RenditionKind) -> Option<&str> {
        self.urls.get(kind.name()).map(String::as_str)
    }

    pub fn thumbnail(&self) -> Option<&str> {
        self.get(RenditionKind::Thumbnail)
    }

    pub fn hls_manifest(&self) -> Option<&str> {
        self.get(RenditionKind::HlsManifest)
    }

    /// URL surfaced to the owner: the high tier for video, the processed image otherwise.
    pub fn primary(&self) -> Option<&str> {
        self.get(RenditionKind::Video(VideoTier::High))
            .or_else(|| self.get(RenditionKind::Processed))
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_set() -> RenditionSet {
        RenditionSet {
            media_kind: MediaKind::Video,
            renditions: vec![
                Rendition::new(RenditionKind::Video(VideoTier::High), "/w/high.mp4", "video/mp4"),
                Rendition::new(RenditionKind::Video(VideoTier::Medium), "/w/medium.mp4", "video/mp4"),
                Rendition::new(RenditionKind::Video(VideoTier::Low), "/w/low.mp4", "video/mp4"),
                Rendition::new(RenditionKind::Thumbnail, "/w/thumbnail.jpg", "image/jpeg"),
            ],
            width: 1080,
            height: 1920,
            duration: Some(12.0),
        }
    }

    #[test]
    fn test_screening_uses_low_tier() {
        let set = video_set();
        let r = set.screening_rendition().unwrap();
        assert_eq!(r.kind, RenditionKind::Video(VideoTier::Low));
        assert!(set.is_complete());
    }

    #[test]
    fn test_file_name() {
        let set = video_set();
        assert_eq!(set.renditions[0].file_name(), "high.mp4");
        assert_eq!(set.renditions[3].file_name(), "thumbnail.jpg");
    }

    #[test]
    fn test_incomplete_image_set() {
        let set = RenditionSet {
            media_kind: MediaKind::Image,
            renditions: vec![Rendition::new(RenditionKind::Processed, "/w/p.jpg", "image/jpeg")],
            width: 800,
            height: 600,
            duration: None,
        };
        assert!(!set.is_complete());
        assert_eq!(set.screening_rendition().unwrap().kind, RenditionKind::Processed);
    }

    #[test]
    fn test_primary_url() {
        let mut urls = PublishedUrls::default();
        urls.insert(RenditionKind::Video(VideoTier::High), "https://cdn/high.mp4");
        urls.insert(RenditionKind::Thumbnail, "https://cdn/thumbnail.jpg");
        assert_eq!(urls.primary(), Some("https://cdn/high.mp4"));
        assert_eq!(urls.thumbnail(), Some("https://cdn/thumbnail.jpg"));
    }

    #[test]
    fn test_hls_object_names() {
        let manifest = Rendition::new(RenditionKind::HlsManifest, "/w/hls/manifest.m3u8", "application/vnd.apple.mpegurl")
            .with_object_name("hls/manifest.m3u8");
        let segment = Rendition::new(RenditionKind::HlsPart, "/w/hls/low/low_000.ts", "video/mp2t")
            .with_object_name("hls/low/low_000.ts");

        assert_eq!(manifest.file_name(), "hls/manifest.m3u8");
        assert_eq!(segment.file_name(), "hls/low/low_000.ts");
        assert!(manifest.kind.is_addressable());
        assert!(!segment.kind.is_addressable());
    }
}
