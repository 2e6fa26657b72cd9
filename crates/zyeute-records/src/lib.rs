//! Content record store.
//!
//! The pipeline writes status, safety flags and rendition URLs to the
//! externally owned `posts` row. Only single-row patches are issued; the
//! record is never read back except for owner preferences.

pub mod client;
pub mod error;
pub mod store;
pub mod types;

pub use client::{RecordsConfig, SupabaseRecords};
pub use error::{RecordsError, RecordsResult};
pub use store::ContentStore;
pub use types::MediaMetadata;
