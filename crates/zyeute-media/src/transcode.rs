//! Video tier transcoding.
//!
//! The high tier is encoded from the source with the visual filter applied;
//! medium and low are derived from the high tier so the filter is baked in
//! once.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use zyeute_models::{VideoTier, VisualFilter};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::filters::video_filter_chain;

/// Paths of the encoded tiers.
#[derive(Debug, Clone)]
pub struct TranscodeOutput {
    pub high: PathBuf,
    pub medium: PathBuf,
    pub low: PathBuf,
}

impl TranscodeOutput {
    pub fn path(&self, tier: VideoTier) -> &Path {
        match tier {
            VideoTier::High => &self.high,
            VideoTier::Medium => &self.medium,
            VideoTier::Low => &self.low,
        }
    }
}

/// Build the encode command for one tier.
pub fn tier_command(
    input: &Path,
    output: &Path,
    tier: VideoTier,
    filter: Option<&str>,
) -> FfmpegCommand {
    let preset = tier.preset();
    let vf = match filter {
        Some(chain) => format!("{},{}", preset.scale_filter(), chain),
        None => preset.scale_filter(),
    };
    FfmpegCommand::new(input, output)
        .video_filter(vf)
        .output_args(preset.to_ffmpeg_args())
}

/// Encode the three tiers into `out_dir`.
///
/// `timeout` applies to each ffmpeg invocation.
pub async fn transcode_tiers(
    source: &Path,
    out_dir: &Path,
    filter: VisualFilter,
    timeout: Duration,
) -> MediaResult<TranscodeOutput> {
    let runner = FfmpegRunner::new().with_timeout(timeout);
    let output = TranscodeOutput {
        high: out_dir.join("high.mp4"),
        medium: out_dir.join("medium.mp4"),
        low: out_dir.join("low.mp4"),
    };

    let chain = video_filter_chain(filter);
    debug!(filter = %filter, "Encoding high tier");
    runner
        .run(&tier_command(source, &output.high, VideoTier::High, chain))
        .await?;

    for tier in [VideoTier::Medium, VideoTier::Low] {
        debug!(tier = tier.as_str(), "Encoding tier from master");
        runner
            .run(&tier_command(&output.high, output.path(tier), tier, None))
            .await?;
    }

    info!("Encoded {} tiers into {}", VideoTier::ALL.len(), out_dir.display());
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_high_tier_carries_filter() {
        let cmd = tier_command(
            Path::new("source"),
            Path::new("high.mp4"),
            VideoTier::High,
            video_filter_chain(VisualFilter::Warm),
        );
        let args = cmd.build_args();
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert!(args[vf + 1].starts_with("scale=1080:1920"));
        assert!(args[vf + 1].ends_with("colorbalance=rs=.3"));
        assert!(args.contains(&"5000k".to_string()));
    }

    #[test]
    fn test_low_tier_without_filter() {
        let cmd = tier_command(Path::new("high.mp4"), Path::new("low.mp4"), VideoTier::Low, None);
        let args = cmd.build_args();
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert!(args[vf + 1].starts_with("scale=480:854"));
        assert!(!args[vf + 1].contains("colorbalance"));
        assert!(args.contains(&"1000k".to_string()));
    }
}
