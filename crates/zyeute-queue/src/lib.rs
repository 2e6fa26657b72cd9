//! Durable job queue for the media pipeline.
//!
//! This crate provides:
//! - Tagged, validated job payloads
//! - The [`JobBroker`] contract (at-least-once, visibility timeout, delayed retry, DLQ)
//! - A Redis Streams broker and an in-process broker
//! - Owner notifications via Redis Pub/Sub

pub mod broker;
pub mod error;
pub mod job;
pub mod memory;
pub mod progress;
pub mod queue;

pub use broker::{Delivery, JobBroker};
pub use error::{QueueError, QueueResult};
pub use job::{ImageJob, QueueJob, VideoJob};
pub use memory::{DeadLetter, MemoryQueue};
pub use progress::{NotificationEvent, ProgressChannel};
pub use queue::{JobQueue, QueueConfig};
