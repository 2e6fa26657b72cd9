//! Shared data models for the Zyeuté media pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Content and job identifiers
//! - Content record status and pipeline stages
//! - Safety verdicts
//! - Renditions and encoding presets
//! - Visual filters
//! - Push notification messages

pub mod encoding;
pub mod filter;
pub mod ids;
pub mod notification;
pub mod rendition;
pub mod safety;
pub mod status;

pub use encoding::{RenditionPreset, VideoTier};
pub use filter::VisualFilter;
pub use ids::{ContentId, JobId, OwnerId};
pub use notification::Notification;
pub use rendition::{MediaKind, PublishedUrls, Rendition, RenditionKind, RenditionSet};
pub use safety::{SafetyFlags, SafetyVerdict, MAX_SAFETY_TAGS};
pub use status::{PipelineStage, ProcessingStatus};
