//! Worker metrics.

use std::time::Duration;

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Finished job attempts by outcome.
    pub const JOBS_TOTAL: &str = "zyeute_jobs_total";

    /// Wall time spent in each pipeline stage.
    pub const STAGE_DURATION_SECONDS: &str = "zyeute_stage_duration_seconds";

    /// Best-effort tasks that failed or panicked.
    pub const DETACHED_TASK_FAILURES_TOTAL: &str = "zyeute_detached_task_failures_total";

    /// Objects left in storage by an aborted publish.
    pub const ORPHANED_OBJECTS_TOTAL: &str = "zyeute_orphaned_objects_total";
}

pub fn record_job(outcome: &'static str) {
    counter!(names::JOBS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_stage(stage: &'static str, elapsed: Duration) {
    histogram!(names::STAGE_DURATION_SECONDS, "stage" => stage).record(elapsed.as_secs_f64());
}

pub fn record_detached_failure(task: &'static str) {
    counter!(names::DETACHED_TASK_FAILURES_TOTAL, "task" => task).increment(1);
}

pub fn record_orphans(count: usize) {
    counter!(names::ORPHANED_OBJECTS_TOTAL).increment(count as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::JOBS_TOTAL.starts_with("zyeute_"));
        assert!(names::STAGE_DURATION_SECONDS.ends_with("_seconds"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_job("completed");
        record_stage("transcoding", Duration::from_millis(5));
        record_detached_failure("transcription");
        record_orphans(2);
    }
}
