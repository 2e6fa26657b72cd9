//! Media pipeline worker.
//!
//! This crate provides:
//! - The per-job orchestrator (transform, safety gate, publish, record)
//! - A bounded, rate-limited job executor with graceful shutdown
//! - Owner notifications and detached best-effort side effects

pub mod config;
pub mod detached;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod retry;
pub mod stages;
pub mod workspace;

pub use config::{UndeterminedPolicy, WorkerConfig};
pub use detached::{DetachedTasks, TaskFailure};
pub use dispatch::{HttpSideEffects, Notifier, SideEffects};
pub use error::{ErrorClass, WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use orchestrator::{Disposition, JobOutcome, JobReport, Orchestrator, PipelineContext};
pub use retry::BackoffPolicy;
pub use workspace::JobWorkspace;
