//! Thumbnail generation.

use std::path::Path;
use std::time::Duration;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::filters::filter_thumbnail;
use zyeute_models::encoding::{THUMBNAIL_TIMESTAMP, VIDEO_THUMBNAIL_HEIGHT, VIDEO_THUMBNAIL_WIDTH};

/// Generate a JPEG thumbnail from a video file.
pub async fn generate_thumbnail(
    video_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    timeout: Duration,
) -> MediaResult<()> {
    let cmd = thumbnail_command(video_path.as_ref(), output_path.as_ref());
    FfmpegRunner::new().with_timeout(timeout).run(&cmd).await
}

fn thumbnail_command(video_path: &Path, output_path: &Path) -> FfmpegCommand {
    FfmpegCommand::new(video_path, output_path)
        .seek(THUMBNAIL_TIMESTAMP)
        .single_frame()
        .video_filter(filter_thumbnail(VIDEO_THUMBNAIL_WIDTH, VIDEO_THUMBNAIL_HEIGHT))
        .output_args(["-q:v", "3"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_command() {
        let args = thumbnail_command(Path::new("high.mp4"), Path::new("thumbnail.jpg")).build_args();
        assert!(args.contains(&"00:00:01".to_string()));
        assert!(args.iter().any(|a| a.starts_with("scale=360:640")));
        assert_eq!(args.last().unwrap(), "thumbnail.jpg");
    }
}
