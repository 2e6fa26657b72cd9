//! Media transform stage backed by ffmpeg and the image pipeline.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use zyeute_media::{
    generate_thumbnail, package_hls, process_image, transcode_tiers, validate_image,
    validate_video, Downloader, HlsPackage, MediaLimits,
};
use zyeute_models::{MediaKind, Rendition, RenditionKind, RenditionSet, VideoTier};
use zyeute_queue::QueueJob;
use zyeute_storage::content_type_for;

use crate::error::WorkerResult;
use crate::stages::{MediaTransformer, SourceMedia};

const SOURCE_FILE: &str = "source";
const RENDITIONS_DIR: &str = "renditions";
const HLS_DIR: &str = "hls";

/// Production transformer: streaming download, ffprobe/image validation,
/// ffmpeg tiers for video and the filter pipeline for stills.
pub struct FfmpegTransformer {
    downloader: Downloader,
    limits: MediaLimits,
    ffmpeg_timeout: Duration,
    hls: bool,
}

impl FfmpegTransformer {
    pub fn new(downloader: Downloader, limits: MediaLimits, ffmpeg_timeout: Duration) -> Self {
        Self {
            downloader,
            limits,
            ffmpeg_timeout,
            hls: false,
        }
    }

    /// Also package video tiers as HLS.
    pub fn with_hls(mut self, enabled: bool) -> Self {
        self.hls = enabled;
        self
    }

    async fn render_video(
        &self,
        job: &QueueJob,
        source: &SourceMedia,
        out_dir: &Path,
    ) -> WorkerResult<RenditionSet> {
        let tiers = transcode_tiers(&source.path, out_dir, job.visual_filter(), self.ffmpeg_timeout)
            .await?;

        let thumbnail = out_dir.join("thumbnail.jpg");
        generate_thumbnail(&tiers.high, &thumbnail, self.ffmpeg_timeout).await?;

        let mut renditions: Vec<Rendition> = VideoTier::ALL
            .iter()
            .map(|tier| Rendition::new(RenditionKind::Video(*tier), tiers.path(*tier), "video/mp4"))
            .collect();
        renditions.push(Rendition::new(RenditionKind::Thumbnail, thumbnail, "image/jpeg"));

        if self.hls {
            let package = package_hls(&tiers, &out_dir.join(HLS_DIR), self.ffmpeg_timeout).await?;
            renditions.extend(hls_renditions(&package));
        }

        let master = VideoTier::High.preset();
        Ok(RenditionSet {
            media_kind: MediaKind::Video,
            renditions,
            width: master.width,
            height: master.height,
            duration: source.duration,
        })
    }

    async fn render_image(
        &self,
        job: &QueueJob,
        source: &SourceMedia,
        out_dir: &Path,
    ) -> WorkerResult<RenditionSet> {
        let processed = process_image(&source.path, out_dir, job.visual_filter()).await?;

        Ok(RenditionSet {
            media_kind: MediaKind::Image,
            renditions: vec![
                Rendition::new(RenditionKind::Processed, processed.processed, "image/jpeg"),
                Rendition::new(RenditionKind::Thumbnail, processed.thumbnail, "image/jpeg"),
            ],
            width: processed.width,
            height: processed.height,
            duration: None,
        })
    }
}

/// HLS parts followed by the master manifest, named `hls/...` relative to
/// the content prefix so the manifest's relative references resolve.
fn hls_renditions(package: &HlsPackage) -> Vec<Rendition> {
    let root = package.root();
    let object_name = |path: &Path| {
        let rel = path.strip_prefix(root).unwrap_or(path);
        format!("{}/{}", HLS_DIR, rel.to_string_lossy())
    };

    let mut renditions: Vec<Rendition> = package
        .parts
        .iter()
        .map(|part| {
            Rendition::new(RenditionKind::HlsPart, part, content_type_for(part))
                .with_object_name(object_name(part.as_path()))
        })
        .collect();
    renditions.push(
        Rendition::new(
            RenditionKind::HlsManifest,
            &package.manifest,
            content_type_for(&package.manifest),
        )
        .with_object_name(object_name(package.manifest.as_path())),
    );
    renditions
}

#[async_trait]
impl MediaTransformer for FfmpegTransformer {
    async fn fetch(&self, job: &QueueJob, workspace: &Path) -> WorkerResult<SourceMedia> {
        let path = workspace.join(SOURCE_FILE);
        let size_bytes = self.downloader.fetch(job.source_url(), &path).await?;
        debug!(bytes = size_bytes, "Source downloaded");

        let source = match job.media_kind() {
            MediaKind::Video => {
                let info = validate_video(&path, &self.limits).await?;
                SourceMedia {
                    kind: MediaKind::Video,
                    path,
                    width: info.width,
                    height: info.height,
                    duration: Some(info.duration),
                    size_bytes,
                }
            }
            MediaKind::Image => {
                let (width, height) = validate_image(&path, &self.limits).await?;
                SourceMedia {
                    kind: MediaKind::Image,
                    path,
                    width,
                    height,
                    duration: None,
                    size_bytes,
                }
            }
        };
        Ok(source)
    }

    async fn render(
        &self,
        job: &QueueJob,
        source: SourceMedia,
        workspace: &Path,
    ) -> WorkerResult<RenditionSet> {
        let out_dir = workspace.join(RENDITIONS_DIR);
        tokio::fs::create_dir_all(&out_dir).await?;

        let set = match source.kind {
            MediaKind::Video => self.render_video(job, &source, &out_dir).await?,
            MediaKind::Image => self.render_image(job, &source, &out_dir).await?,
        };

        if let Err(e) = tokio::fs::remove_file(&source.path).await {
            warn!(path = %source.path.display(), "Failed to remove source file: {}", e);
        }
        info!(
            media_kind = set.media_kind.as_str(),
            renditions = set.renditions.len(),
            "Renditions ready"
        );
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::path::PathBuf;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zyeute_media::DownloadConfig;
    use zyeute_models::VisualFilter;
    use zyeute_queue::ImageJob;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 255) as u8, (y % 255) as u8, 90]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageOutputFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn transformer() -> FfmpegTransformer {
        FfmpegTransformer::new(
            Downloader::new(DownloadConfig::default()).unwrap(),
            MediaLimits::default(),
            Duration::from_secs(30),
        )
    }

    #[tokio::test]
    async fn test_image_fetch_and_render() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/uploads/photo.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(640, 480)))
            .mount(&server)
            .await;

        let workspace = tempfile::tempdir().unwrap();
        let job: QueueJob = ImageJob::new(
            "post-1",
            "owner-1",
            format!("{}/uploads/photo.png", server.uri()),
        )
        .with_filter(VisualFilter::Noir)
        .into();

        let t = transformer();
        let source = t.fetch(&job, workspace.path()).await.unwrap();
        assert_eq!(source.kind, MediaKind::Image);
        assert_eq!((source.width, source.height), (640, 480));
        let source_path = source.path.clone();

        let set = t.render(&job, source, workspace.path()).await.unwrap();
        assert!(set.is_complete());
        assert_eq!((set.width, set.height), (640, 480));
        assert!(!source_path.exists());
        for path in set.paths() {
            assert!(path.exists());
            assert!(path.starts_with(workspace.path()));
        }
    }

    #[tokio::test]
    async fn test_missing_source_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let workspace = tempfile::tempdir().unwrap();
        let job: QueueJob = ImageJob::new("post-1", "owner-1", format!("{}/gone.png", server.uri())).into();

        let err = transformer().fetch(&job, workspace.path()).await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_corrupt_image_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"definitely not a picture".to_vec()))
            .mount(&server)
            .await;

        let workspace = tempfile::tempdir().unwrap();
        let job: QueueJob = ImageJob::new("post-1", "owner-1", format!("{}/bad.png", server.uri())).into();

        let err = transformer().fetch(&job, workspace.path()).await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn test_hls_renditions_named_relative_to_package() {
        let package = HlsPackage {
            manifest: PathBuf::from("/w/renditions/hls/manifest.m3u8"),
            parts: vec![
                PathBuf::from("/w/renditions/hls/low/low.m3u8"),
                PathBuf::from("/w/renditions/hls/low/low_000.ts"),
            ],
        };

        let renditions = hls_renditions(&package);

        assert_eq!(renditions.len(), 3);
        assert_eq!(renditions[0].file_name(), "hls/low/low.m3u8");
        assert_eq!(renditions[0].content_type, "application/vnd.apple.mpegurl");
        assert_eq!(renditions[1].file_name(), "hls/low/low_000.ts");
        assert_eq!(renditions[1].content_type, "video/mp2t");
        assert_eq!(renditions[1].kind, RenditionKind::HlsPart);
        let manifest = renditions.last().unwrap();
        assert_eq!(manifest.kind, RenditionKind::HlsManifest);
        assert_eq!(manifest.file_name(), "hls/manifest.m3u8");
    }
}
