//! Rendition encoding presets.
//!
//! Quality tiers are fixed by configuration here, never chosen by the caller.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "fast";
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";
/// Output frame rate for every tier
pub const DEFAULT_FPS: u32 = 30;

/// Video thumbnail settings
pub const VIDEO_THUMBNAIL_WIDTH: u32 = 360;
pub const VIDEO_THUMBNAIL_HEIGHT: u32 = 640;
pub const THUMBNAIL_TIMESTAMP: &str = "00:00:01";

/// Image pipeline settings
pub const IMAGE_THUMBNAIL_WIDTH: u32 = 400;
pub const IMAGE_MAX_WIDTH: u32 = 1080;
pub const IMAGE_MAX_HEIGHT: u32 = 1920;
pub const IMAGE_JPEG_QUALITY: u8 = 85;

/// Video bitrate tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VideoTier {
    High,
    Medium,
    Low,
}

impl VideoTier {
    pub const ALL: [VideoTier; 3] = [VideoTier::High, VideoTier::Medium, VideoTier::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoTier::High => "high",
            VideoTier::Medium => "medium",
            VideoTier::Low => "low",
        }
    }

    /// Encoding preset for this tier.
    pub fn preset(&self) -> RenditionPreset {
        match self {
            VideoTier::High => RenditionPreset::new(1080, 1920, "5000k"),
            VideoTier::Medium => RenditionPreset::new(720, 1280, "2500k"),
            VideoTier::Low => RenditionPreset::new(480, 854, "1000k"),
        }
    }
}

/// Encoding parameters for one video rendition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RenditionPreset {
    pub width: u32,
    pub height: u32,
    pub video_bitrate: String,
    pub codec: String,
    pub preset: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub fps: u32,
}

impl RenditionPreset {
    pub fn new(width: u32, height: u32, video_bitrate: impl Into<String>) -> Self {
        Self {
            width,
            height,
            video_bitrate: video_bitrate.into(),
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            fps: DEFAULT_FPS,
        }
    }

    /// FFmpeg scale filter fitting the source into the portrait frame.
    pub fn scale_filter(&self) -> String {
        format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
            w = self.width,
            h = self.height
        )
    }

    /// Video bitrate in bits per second, as advertised in an HLS manifest.
    ///
    /// Accepts ffmpeg's `k`/`M` suffixes; an unparseable value yields `None`.
    pub fn bandwidth_bps(&self) -> Option<u64> {
        let value = self.video_bitrate.trim();
        let (digits, scale) = match value.char_indices().last()? {
            (i, 'k') | (i, 'K') => (&value[..i], 1_000),
            (i, 'm') | (i, 'M') => (&value[..i], 1_000_000),
            _ => (value, 1),
        };
        digits.parse::<u64>().ok().map(|n| n * scale)
    }

    /// FFmpeg output arguments (codec, bitrate, audio).
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-b:v".to_string(),
            self.video_bitrate.clone(),
            "-r".to_string(),
            self.fps.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
            "-movflags".to_string(),
            "+faststart".to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_presets() {
        let high = VideoTier::High.preset();
        assert_eq!((high.width, high.height), (1080, 1920));
        assert_eq!(high.video_bitrate, "5000k");

        let low = VideoTier::Low.preset();
        assert_eq!((low.width, low.height), (480, 854));
        assert_eq!(low.video_bitrate, "1000k");
    }

    #[test]
    fn test_ffmpeg_args() {
        let args = VideoTier::Medium.preset().to_ffmpeg_args();
        assert!(args.windows(2).any(|w| w[0] == "-b:v" && w[1] == "2500k"));
        assert!(args.contains(&"libx264".to_string()));
    }

    #[test]
    fn test_bandwidth_from_bitrate() {
        assert_eq!(VideoTier::High.preset().bandwidth_bps(), Some(5_000_000));
        assert_eq!(VideoTier::Low.preset().bandwidth_bps(), Some(1_000_000));
        assert_eq!(RenditionPreset::new(1, 1, "2M").bandwidth_bps(), Some(2_000_000));
        assert_eq!(RenditionPreset::new(1, 1, "fast").bandwidth_bps(), None);
    }
}
