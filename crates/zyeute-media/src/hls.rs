//! HLS packaging of encoded tiers.
//!
//! Each tier mp4 is remuxed (no re-encode) into a VOD playlist with 4 second
//! segments under `{out_dir}/{tier}/`, and a master playlist listing the
//! tiers is written to `{out_dir}/manifest.m3u8`.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use zyeute_models::VideoTier;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::transcode::TranscodeOutput;

pub const MASTER_MANIFEST: &str = "manifest.m3u8";
const SEGMENT_SECONDS: u32 = 4;

/// Variants in the order players should see them, lowest bandwidth first.
const LADDER: [VideoTier; 3] = [VideoTier::Low, VideoTier::Medium, VideoTier::High];

/// Files written by [`package_hls`].
#[derive(Debug, Clone)]
pub struct HlsPackage {
    pub manifest: PathBuf,
    /// Variant playlists and segments, sorted by path.
    pub parts: Vec<PathBuf>,
}

impl HlsPackage {
    /// Root directory the package was written to.
    pub fn root(&self) -> &Path {
        self.manifest.parent().unwrap_or_else(|| Path::new("."))
    }
}

/// Build the remux command for one tier.
pub fn variant_command(tier_mp4: &Path, out_dir: &Path, tier: VideoTier) -> FfmpegCommand {
    let name = tier.as_str();
    let tier_dir = out_dir.join(name);
    let segments = tier_dir
        .join(format!("{}_%03d.ts", name))
        .to_string_lossy()
        .into_owned();
    let seconds = SEGMENT_SECONDS.to_string();

    FfmpegCommand::new(tier_mp4, tier_dir.join(format!("{}.m3u8", name))).output_args([
        "-c",
        "copy",
        "-f",
        "hls",
        "-hls_time",
        seconds.as_str(),
        "-hls_playlist_type",
        "vod",
        "-hls_segment_filename",
        segments.as_str(),
    ])
}

/// Master playlist text referencing each tier's variant playlist.
pub fn master_manifest() -> String {
    let mut out = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
    for tier in LADDER {
        let preset = tier.preset();
        let bandwidth = preset.bandwidth_bps().unwrap_or(1_000_000);
        let name = tier.as_str();
        let _ = writeln!(
            out,
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}x{},NAME=\"{}\"",
            bandwidth, preset.width, preset.height, name
        );
        let _ = writeln!(out, "{}/{}.m3u8", name, name);
    }
    out
}

/// Segment every tier of `tiers` into `out_dir` and write the master playlist.
///
/// `timeout` applies to each ffmpeg invocation.
pub async fn package_hls(
    tiers: &TranscodeOutput,
    out_dir: &Path,
    timeout: Duration,
) -> MediaResult<HlsPackage> {
    let runner = FfmpegRunner::new().with_timeout(timeout);

    for tier in LADDER {
        tokio::fs::create_dir_all(out_dir.join(tier.as_str())).await?;
        debug!(tier = tier.as_str(), "Packaging HLS variant");
        runner
            .run(&variant_command(tiers.path(tier), out_dir, tier))
            .await?;
    }

    let manifest = out_dir.join(MASTER_MANIFEST);
    tokio::fs::write(&manifest, master_manifest()).await?;

    let parts = collect_parts(out_dir).await?;
    if parts.is_empty() {
        return Err(MediaError::internal("HLS packaging produced no segments"));
    }

    info!("Packaged {} HLS parts into {}", parts.len(), out_dir.display());
    Ok(HlsPackage { manifest, parts })
}

/// Variant playlists and segments under each tier directory.
async fn collect_parts(out_dir: &Path) -> MediaResult<Vec<PathBuf>> {
    let mut parts = Vec::new();
    for tier in LADDER {
        let mut entries = tokio::fs::read_dir(out_dir.join(tier.as_str())).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_part = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("m3u8") | Some("ts")
            );
            if is_part {
                parts.push(path);
            }
        }
    }
    parts.sort();
    Ok(parts)
}
