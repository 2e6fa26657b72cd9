//! Still image pipeline: named filter, normalize, bounded resize, JPEG re-encode
//! and a square thumbnail.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};
use tracing::info;

use zyeute_models::encoding::{
    IMAGE_JPEG_QUALITY, IMAGE_MAX_HEIGHT, IMAGE_MAX_WIDTH, IMAGE_THUMBNAIL_WIDTH,
};
use zyeute_models::VisualFilter;

use crate::error::{MediaError, MediaResult};

/// Output of the image pipeline.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub processed: PathBuf,
    pub thumbnail: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Per-pixel adjustment.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Adjust {
    /// Multiply brightness and scale saturation around luma
    Modulate { brightness: f32, saturation: f32 },
    /// Multiply channels by a colour, as fractions of 255
    Tint(u8, u8, u8),
    Sepia(f32),
    Greyscale,
    Contrast(f32),
    /// Stretch luma to the full range
    Normalize,
}

fn adjustments(filter: VisualFilter) -> Vec<Adjust> {
    use Adjust::*;
    match filter {
        VisualFilter::Prestige => vec![
            Modulate { brightness: 1.1, saturation: 1.2 },
            Normalize,
        ],
        VisualFilter::Nordic => vec![
            Tint(200, 220, 255),
            Modulate { brightness: 1.05, saturation: 1.1 },
        ],
        VisualFilter::Quebecois => vec![
            Modulate { brightness: 1.05, saturation: 1.15 },
            Tint(255, 240, 220),
        ],
        VisualFilter::Vintage => vec![
            Sepia(0.8),
            Modulate { brightness: 0.95, saturation: 1.0 },
        ],
        VisualFilter::Noir => vec![
            Greyscale,
            Modulate { brightness: 0.9, saturation: 1.0 },
            Contrast(1.3),
        ],
        VisualFilter::Warm => vec![
            Modulate { brightness: 1.1, saturation: 1.3 },
            Tint(255, 245, 235),
        ],
        VisualFilter::Cool => vec![
            Tint(180, 200, 255),
            Modulate { brightness: 1.05, saturation: 0.9 },
        ],
        VisualFilter::Bright => vec![
            Modulate { brightness: 1.2, saturation: 1.4 },
            Normalize,
        ],
        VisualFilter::None => vec![Normalize],
    }
}

fn luma(p: &Rgb<u8>) -> f32 {
    0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32
}

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

fn apply(img: &mut RgbImage, adjust: Adjust) {
    match adjust {
        Adjust::Normalize => normalize(img),
        _ => {
            for p in img.pixels_mut() {
                *p = adjust_pixel(*p, adjust);
            }
        }
    }
}

fn adjust_pixel(p: Rgb<u8>, adjust: Adjust) -> Rgb<u8> {
    let [r, g, b] = p.0.map(|c| c as f32);
    match adjust {
        Adjust::Modulate { brightness, saturation } => {
            let (r, g, b) = (r * brightness, g * brightness, b * brightness);
            let l = 0.299 * r + 0.587 * g + 0.114 * b;
            Rgb([
                clamp_u8(l + (r - l) * saturation),
                clamp_u8(l + (g - l) * saturation),
                clamp_u8(l + (b - l) * saturation),
            ])
        }
        Adjust::Tint(tr, tg, tb) => Rgb([
            clamp_u8(r * tr as f32 / 255.0),
            clamp_u8(g * tg as f32 / 255.0),
            clamp_u8(b * tb as f32 / 255.0),
        ]),
        Adjust::Sepia(amount) => {
            let sr = 0.393 * r + 0.769 * g + 0.189 * b;
            let sg = 0.349 * r + 0.686 * g + 0.168 * b;
            let sb = 0.272 * r + 0.534 * g + 0.131 * b;
            Rgb([
                clamp_u8(r + (sr - r) * amount),
                clamp_u8(g + (sg - g) * amount),
                clamp_u8(b + (sb - b) * amount),
            ])
        }
        Adjust::Greyscale => {
            let l = clamp_u8(luma(&p));
            Rgb([l, l, l])
        }
        Adjust::Contrast(k) => Rgb([
            clamp_u8((r - 128.0) * k + 128.0),
            clamp_u8((g - 128.0) * k + 128.0),
            clamp_u8((b - 128.0) * k + 128.0),
        ]),
        Adjust::Normalize => p,
    }
}

fn normalize(img: &mut RgbImage) {
    let (lo, hi) = img.pixels().fold((255.0f32, 0.0f32), |(lo, hi), p| {
        let l = luma(p);
        (lo.min(l), hi.max(l))
    });
    if hi - lo < 1.0 {
        return;
    }
    let scale = 255.0 / (hi - lo);
    for p in img.pixels_mut() {
        *p = Rgb(p.0.map(|c| clamp_u8((c as f32 - lo) * scale)));
    }
}

fn write_jpeg(img: &RgbImage, path: &Path, quality: u8) -> MediaResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    JpegEncoder::new_with_quality(&mut writer, quality).encode_image(img)?;
    Ok(())
}

fn process_blocking(
    source: &Path,
    out_dir: &Path,
    filter: VisualFilter,
) -> MediaResult<ProcessedImage> {
    let decoded = image::io::Reader::open(source)?
        .with_guessed_format()?
        .decode()?;

    let bounded = if decoded.width() > IMAGE_MAX_WIDTH || decoded.height() > IMAGE_MAX_HEIGHT {
        decoded.resize(IMAGE_MAX_WIDTH, IMAGE_MAX_HEIGHT, FilterType::Lanczos3)
    } else {
        decoded
    };

    let mut rgb = bounded.to_rgb8();
    for adjust in adjustments(filter) {
        apply(&mut rgb, adjust);
    }

    let processed = out_dir.join("processed.jpg");
    write_jpeg(&rgb, &processed, IMAGE_JPEG_QUALITY)?;

    let thumb = DynamicImage::ImageRgb8(rgb.clone())
        .resize_to_fill(IMAGE_THUMBNAIL_WIDTH, IMAGE_THUMBNAIL_WIDTH, FilterType::Triangle)
        .to_rgb8();
    let thumbnail = out_dir.join("thumbnail.jpg");
    write_jpeg(&thumb, &thumbnail, 80)?;

    Ok(ProcessedImage {
        processed,
        thumbnail,
        width: rgb.width(),
        height: rgb.height(),
    })
}

/// Run the image pipeline on a blocking thread.
pub async fn process_image(
    source: &Path,
    out_dir: &Path,
    filter: VisualFilter,
) -> MediaResult<ProcessedImage> {
    let source = source.to_path_buf();
    let out_dir = out_dir.to_path_buf();
    let result = tokio::task::spawn_blocking(move || process_blocking(&source, &out_dir, filter))
        .await
        .map_err(|e| MediaError::internal(format!("image task failed: {e}")))??;

    info!(
        filter = %filter,
        width = result.width,
        height = result.height,
        "Image processed"
    );
    Ok(result)
}
