//! Row payloads for the `posts` and `user_profiles` tables.

use serde::{Deserialize, Serialize};

use zyeute_models::{PublishedUrls, RenditionKind, VideoTier};

/// `media_metadata` column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

/// Column holding the URL of a rendition. HLS parts have none.
pub(crate) fn url_column(kind: RenditionKind) -> Option<&'static str> {
    match kind {
        RenditionKind::Video(VideoTier::High) => Some("video_high_url"),
        RenditionKind::Video(VideoTier::Medium) => Some("video_medium_url"),
        RenditionKind::Video(VideoTier::Low) => Some("video_low_url"),
        RenditionKind::Processed => Some("media_url"),
        RenditionKind::Thumbnail => Some("thumbnail_url"),
        RenditionKind::HlsManifest => Some("hls_url"),
        RenditionKind::HlsPart => None,
    }
}

const URL_KINDS: [RenditionKind; 6] = [
    RenditionKind::Video(VideoTier::High),
    RenditionKind::Video(VideoTier::Medium),
    RenditionKind::Video(VideoTier::Low),
    RenditionKind::Processed,
    RenditionKind::Thumbnail,
    RenditionKind::HlsManifest,
];

/// Patch body for a published rendition set.
///
/// `media_url` always points at the primary rendition so feeds that only
/// know one URL column keep working for videos.
pub(crate) fn rendition_patch(urls: &PublishedUrls, metadata: &MediaMetadata) -> serde_json::Value {
    let mut body = serde_json::Map::new();
    for kind in URL_KINDS {
        if let (Some(column), Some(url)) = (url_column(kind), urls.get(kind)) {
            body.insert(column.to_string(), url.into());
        }
    }
    if let Some(primary) = urls.primary() {
        body.insert("media_url".to_string(), primary.into());
    }
    body.insert(
        "media_metadata".to_string(),
        serde_json::to_value(metadata).unwrap_or(serde_json::Value::Null),
    );
    serde_json::Value::Object(body)
}

/// Row returned when selecting owner preferences.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ProfilePreferences {
    #[serde(default)]
    pub ti_guy_comments_enabled: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_video_patch_columns() {
        let mut urls = PublishedUrls::default();
        urls.insert(RenditionKind::Video(VideoTier::High), "https://cdn/h.mp4");
        urls.insert(RenditionKind::Video(VideoTier::Medium), "https://cdn/m.mp4");
        urls.insert(RenditionKind::Video(VideoTier::Low), "https://cdn/l.mp4");
        urls.insert(RenditionKind::Thumbnail, "https://cdn/t.jpg");
        let meta = MediaMetadata {
            width: 1080,
            height: 1920,
            duration: Some(12.5),
        };

        let body = rendition_patch(&urls, &meta);
        assert_eq!(
            body,
            json!({
                "video_high_url": "https://cdn/h.mp4",
                "video_medium_url": "https://cdn/m.mp4",
                "video_low_url": "https://cdn/l.mp4",
                "thumbnail_url": "https://cdn/t.jpg",
                "media_url": "https://cdn/h.mp4",
                "media_metadata": {"width": 1080, "height": 1920, "duration": 12.5},
            })
        );
    }

    #[test]
    fn test_image_patch_omits_duration() {
        let mut urls = PublishedUrls::default();
        urls.insert(RenditionKind::Processed, "https://cdn/p.jpg");
        let meta = MediaMetadata {
            width: 800,
            height: 600,
            duration: None,
        };

        let body = rendition_patch(&urls, &meta);
        assert_eq!(body["media_url"], "https://cdn/p.jpg");
        assert!(body.get("video_high_url").is_none());
        assert!(body["media_metadata"].get("duration").is_none());
    }

    #[test]
    fn test_hls_manifest_column() {
        let mut urls = PublishedUrls::default();
        urls.insert(RenditionKind::Video(VideoTier::High), "https://cdn/h.mp4");
        urls.insert(RenditionKind::HlsManifest, "https://cdn/hls/manifest.m3u8");
        let meta = MediaMetadata {
            width: 1080,
            height: 1920,
            duration: Some(4.0),
        };

        let body = rendition_patch(&urls, &meta);
        assert_eq!(body["hls_url"], "https://cdn/hls/manifest.m3u8");
        assert_eq!(body["media_url"], "https://cdn/h.mp4");
        assert_eq!(url_column(RenditionKind::HlsPart), None);
    }
}
