//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::retry::BackoffPolicy;

/// What to do when the safety service cannot produce a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndeterminedPolicy {
    /// Continue and record `safety_flags.reason = "ai_error"`
    Approve,
    /// Fail the job permanently
    Reject,
    /// Treat as a transient failure
    Retry,
}

impl UndeterminedPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            UndeterminedPolicy::Approve => "approve",
            UndeterminedPolicy::Reject => "reject",
            UndeterminedPolicy::Retry => "retry",
        }
    }
}

impl FromStr for UndeterminedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" => Ok(UndeterminedPolicy::Approve),
            "reject" => Ok(UndeterminedPolicy::Reject),
            "retry" => Ok(UndeterminedPolicy::Retry),
            other => Err(format!("unknown safety policy '{}'", other)),
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Job starts allowed per second
    pub max_starts_per_sec: u32,
    /// Deliveries of one job before it is dead-lettered
    pub max_attempts: u32,
    /// First retry delay; doubles per attempt
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    /// Timeout for each ffmpeg invocation
    pub ffmpeg_timeout: Duration,
    /// How long a dequeue blocks waiting for work
    pub poll_block: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Root for per-attempt workspaces
    pub work_dir: PathBuf,
    /// Prometheus exporter port; `None` disables the exporter
    pub metrics_port: Option<u16>,
    pub undetermined_policy: UndeterminedPolicy,
    /// Detached task failures kept in memory
    pub detached_failure_log: usize,
    /// Also publish an HLS ladder (master manifest, variant playlists, segments) for videos
    pub hls_enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            max_starts_per_sec: 10,
            max_attempts: 3,
            retry_base_delay: Duration::from_secs(5),
            retry_max_delay: Duration::from_secs(300),
            ffmpeg_timeout: Duration::from_secs(600),
            poll_block: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(30),
            work_dir: PathBuf::from("/tmp/zyeute"),
            metrics_port: None,
            undetermined_policy: UndeterminedPolicy::Approve,
            detached_failure_log: 100,
            hls_enabled: false,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: env_parse("WORKER_MAX_JOBS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            max_starts_per_sec: env_parse("WORKER_MAX_STARTS_PER_SEC")
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.max_starts_per_sec),
            max_attempts: env_parse("WORKER_MAX_ATTEMPTS")
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.max_attempts),
            retry_base_delay: env_parse("WORKER_RETRY_BASE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry_base_delay),
            retry_max_delay: env_parse("WORKER_RETRY_MAX_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry_max_delay),
            ffmpeg_timeout: env_parse("WORKER_FFMPEG_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.ffmpeg_timeout),
            poll_block: env_parse("WORKER_POLL_BLOCK_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_block),
            shutdown_timeout: env_parse("WORKER_SHUTDOWN_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            metrics_port: env_parse("METRICS_PORT"),
            undetermined_policy: env_parse("SAFETY_UNDETERMINED_POLICY")
                .unwrap_or(defaults.undetermined_policy),
            detached_failure_log: env_parse("WORKER_DETACHED_FAILURE_LOG")
                .unwrap_or(defaults.detached_failure_log),
            hls_enabled: env_parse("WORKER_HLS_ENABLED").unwrap_or(defaults.hls_enabled),
        }
    }

    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.retry_base_delay, self.retry_max_delay)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.max_starts_per_sec, 10);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.undetermined_policy, UndeterminedPolicy::Approve);
        assert!(!config.hls_enabled);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("REJECT".parse::<UndeterminedPolicy>(), Ok(UndeterminedPolicy::Reject));
        assert_eq!(" retry ".parse::<UndeterminedPolicy>(), Ok(UndeterminedPolicy::Retry));
        assert!("maybe".parse::<UndeterminedPolicy>().is_err());
    }
}
