//! Source validation against upload limits.

use std::path::Path;

use tracing::debug;

use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_video, VideoInfo};

/// Limits applied to uploaded sources.
#[derive(Debug, Clone)]
pub struct MediaLimits {
    pub max_bytes: u64,
    pub min_duration_secs: f64,
    pub max_duration_secs: f64,
    /// Largest decoded image accepted, in pixels
    pub max_image_pixels: u64,
}

impl Default for MediaLimits {
    fn default() -> Self {
        Self {
            max_bytes: 100 * 1024 * 1024,
            min_duration_secs: 3.0,
            max_duration_secs: 180.0,
            max_image_pixels: 40_000_000,
        }
    }
}

impl MediaLimits {
    /// Create limits from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_bytes: std::env::var("MEDIA_MAX_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_bytes),
            min_duration_secs: std::env::var("MEDIA_MIN_DURATION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.min_duration_secs),
            max_duration_secs: std::env::var("MEDIA_MAX_DURATION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_duration_secs),
            max_image_pixels: std::env::var("MEDIA_MAX_IMAGE_PIXELS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_image_pixels),
        }
    }

    /// Check probed video metadata against the limits.
    pub fn check_video(&self, info: &VideoInfo) -> MediaResult<()> {
        if info.size > self.max_bytes {
            return Err(MediaError::resource_limit(format!(
                "file is {} bytes, max {}",
                info.size, self.max_bytes
            )));
        }
        if info.width == 0 || info.height == 0 {
            return Err(MediaError::invalid_media("video stream has no dimensions"));
        }
        if !info.duration.is_finite()
            || info.duration < self.min_duration_secs
            || info.duration > self.max_duration_secs
        {
            return Err(MediaError::resource_limit(format!(
                "duration {:.1}s outside {}..={}s",
                info.duration, self.min_duration_secs, self.max_duration_secs
            )));
        }
        Ok(())
    }

    pub fn check_image(&self, width: u32, height: u32, size: u64) -> MediaResult<()> {
        if size > self.max_bytes {
            return Err(MediaError::resource_limit(format!(
                "file is {} bytes, max {}",
                size, self.max_bytes
            )));
        }
        if width == 0 || height == 0 {
            return Err(MediaError::invalid_media("image has no dimensions"));
        }
        let pixels = width as u64 * height as u64;
        if pixels > self.max_image_pixels {
            return Err(MediaError::resource_limit(format!(
                "image is {}x{}, max {} pixels",
                width, height, self.max_image_pixels
            )));
        }
        Ok(())
    }
}

/// Probe and validate a downloaded video.
pub async fn validate_video(path: &Path, limits: &MediaLimits) -> MediaResult<VideoInfo> {
    let info = probe_video(path).await?;
    limits.check_video(&info)?;
    debug!(
        width = info.width,
        height = info.height,
        duration = info.duration,
        "Video source validated"
    );
    Ok(info)
}

/// Validate a downloaded image without decoding the full pixel data.
///
/// Returns the image dimensions.
pub async fn validate_image(path: &Path, limits: &MediaLimits) -> MediaResult<(u32, u32)> {
    let size = tokio::fs::metadata(path).await?.len();
    let path = path.to_path_buf();
    let (width, height) = tokio::task::spawn_blocking(move || {
        image::io::Reader::open(&path)?
            .with_guessed_format()?
            .into_dimensions()
            .map_err(MediaError::from)
    })
    .await
    .map_err(|e| MediaError::internal(e.to_string()))??;

    limits.check_image(width, height, size)?;
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(duration: f64, size: u64) -> VideoInfo {
        VideoInfo {
            duration,
            width: 1080,
            height: 1920,
            fps: 30.0,
            codec: "h264".to_string(),
            format_name: "mp4".to_string(),
            size,
            has_audio: true,
        }
    }

    #[test]
    fn test_video_limits() {
        let limits = MediaLimits::default();
        assert!(limits.check_video(&info(10.0, 1024)).is_ok());
        assert!(limits.check_video(&info(3.0, 1024)).is_ok());
        assert!(limits.check_video(&info(180.0, 1024)).is_ok());

        assert!(limits.check_video(&info(2.9, 1024)).is_err());
        assert!(limits.check_video(&info(181.0, 1024)).is_err());
        assert!(limits.check_video(&info(10.0, 101 * 1024 * 1024)).is_err());
    }

    #[test]
    fn test_image_limits() {
        let limits = MediaLimits::default();
        assert!(limits.check_image(1080, 1920, 1000).is_ok());
        assert!(limits.check_image(0, 1920, 1000).is_err());
        assert!(limits.check_image(10_000, 10_000, 1000).is_err());
    }

    #[tokio::test]
    async fn test_validate_image_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source.bin");
        tokio::fs::write(&path, b"definitely not an image").await.unwrap();

        let err = validate_image(&path, &MediaLimits::default()).await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_validate_image_accepts_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source.png");
        image::RgbImage::new(64, 32).save(&path).unwrap();

        let (w, h) = validate_image(&path, &MediaLimits::default()).await.unwrap();
        assert_eq!((w, h), (64, 32));
    }
}
