//! Object storage for published renditions.
//!
//! This crate provides:
//! - The [`ObjectStore`] contract used by the publish stage
//! - Cache-control and content-type policy per artifact
//! - An S3-compatible client (Cloudflare R2, GCS interop)

pub mod cache;
pub mod client;
pub mod error;
pub mod store;

pub use cache::{content_type_for, CachePolicy, UploadOptions};
pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use store::ObjectStore;
