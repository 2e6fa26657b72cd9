//! Cache headers and content types for published artifacts.

use std::path::Path;

/// One year, for renditions that never change once published.
pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";
/// One day, for manifest-style artifacts that may be rewritten.
pub const MANIFEST_CACHE_CONTROL: &str = "public, max-age=86400";

/// Cache policy of a published object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    Immutable,
    Manifest,
}

impl CachePolicy {
    /// Policy for a file, by extension.
    pub fn for_path(path: &Path) -> Self {
        match extension(path).as_deref() {
            Some("m3u8") | Some("mpd") => CachePolicy::Manifest,
            _ => CachePolicy::Immutable,
        }
    }

    pub fn header(&self) -> &'static str {
        match self {
            CachePolicy::Immutable => IMMUTABLE_CACHE_CONTROL,
            CachePolicy::Manifest => MANIFEST_CACHE_CONTROL,
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Content type for a file, by extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match extension(path).as_deref() {
        Some("mp4") => "video/mp4",
        Some("m3u8") => "application/vnd.apple.mpegurl",
        Some("mpd") => "application/dash+xml",
        Some("ts") => "video/mp2t",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Headers attached to an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub content_type: String,
    pub cache_control: String,
}

impl UploadOptions {
    pub fn new(content_type: impl Into<String>, cache_control: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            cache_control: cache_control.into(),
        }
    }

    /// Options derived from the file extension.
    pub fn for_path(path: &Path) -> Self {
        Self::new(content_type_for(path), CachePolicy::for_path(path).header())
    }
}
