//! FFmpeg video filter definitions for the named visual filters.

use zyeute_models::VisualFilter;

/// Sepia colour matrix.
pub const FILTER_SEPIA: &str = "colorchannelmixer=.393:.769:.189:0:.349:.686:.168:0:.272:.534:.131";

/// Filter chain applied to the master rendition for a visual filter.
///
/// Filters that only exist in the still image pipeline have no video
/// counterpart and yield `None`.
pub fn video_filter_chain(filter: VisualFilter) -> Option<&'static str> {
    match filter {
        VisualFilter::Vintage => Some(concat!(
            "colorchannelmixer=.393:.769:.189:0:.349:.686:.168:0:.272:.534:.131,",
            "vignette"
        )),
        VisualFilter::Bright => Some("eq=brightness=0.06:saturation=1.5"),
        VisualFilter::Noir => Some("hue=s=0,eq=contrast=1.5"),
        VisualFilter::Warm => Some("colorbalance=rs=.3"),
        VisualFilter::Cool => Some("colorbalance=bs=.3"),
        VisualFilter::Quebecois => Some("colorbalance=bs=.4:gs=.1"),
        VisualFilter::None | VisualFilter::Prestige | VisualFilter::Nordic => None,
    }
}

/// Scale filter for a thumbnail of the given size, padded to keep the frame.
pub fn filter_thumbnail(width: u32, height: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
        w = width,
        h = height
    )
}
