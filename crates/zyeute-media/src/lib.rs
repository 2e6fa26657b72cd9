//! Media processing for the Zyeuté pipeline.
//!
//! This crate provides:
//! - FFmpeg command building and execution with timeouts
//! - FFprobe inspection and source validation
//! - Streaming HTTP download of uploaded sources
//! - Video tier transcoding and thumbnails
//! - HLS packaging of the encoded tiers
//! - The still image filter pipeline

pub mod command;
pub mod download;
pub mod error;
pub mod filters;
pub mod hls;
pub mod photo;
pub mod probe;
pub mod progress;
pub mod thumbnail;
pub mod transcode;
pub mod validate;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use download::{Downloader, DownloadConfig};
pub use error::{MediaError, MediaResult};
pub use filters::video_filter_chain;
pub use hls::{package_hls, HlsPackage};
pub use photo::{process_image, ProcessedImage};
pub use probe::{probe_video, VideoInfo};
pub use progress::FfmpegProgress;
pub use thumbnail::generate_thumbnail;
pub use transcode::{transcode_tiers, TranscodeOutput};
pub use validate::{validate_image, validate_video, MediaLimits};
