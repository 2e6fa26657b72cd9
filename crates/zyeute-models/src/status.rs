//! Content record status and orchestrator stages.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Externally visible processing status of a content record.
///
/// Moves forward only: `pending -> processing -> completed | failed`.
/// Retries never surface here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            ProcessingStatus::Pending => 0,
            ProcessingStatus::Processing => 1,
            ProcessingStatus::Completed | ProcessingStatus::Failed => 2,
        }
    }

    /// Whether this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }

    /// Whether moving from `self` to `next` keeps the status walk forward-only.
    ///
    /// Terminal states accept nothing, and a terminal state can only be
    /// reached from `processing`.
    pub fn can_transition_to(&self, next: ProcessingStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next.is_terminal() {
            return *self == ProcessingStatus::Processing;
        }
        next.rank() >= self.rank()
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orchestrator state for a single job attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Queued,
    Downloading,
    Transcoding,
    Scouting,
    Uploading,
    Finalizing,
    Completed,
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Queued => "queued",
            PipelineStage::Downloading => "downloading",
            PipelineStage::Transcoding => "transcoding",
            PipelineStage::Scouting => "scouting",
            PipelineStage::Uploading => "uploading",
            PipelineStage::Finalizing => "finalizing",
            PipelineStage::Completed => "completed",
            PipelineStage::Failed => "failed",
        }
    }

    /// Progress percentage reported when the stage is entered.
    pub fn progress(&self) -> u8 {
        match self {
            PipelineStage::Queued => 0,
            PipelineStage::Downloading => 10,
            PipelineStage::Transcoding => 30,
            PipelineStage::Scouting => 60,
            PipelineStage::Uploading => 80,
            PipelineStage::Finalizing => 90,
            PipelineStage::Completed | PipelineStage::Failed => 100,
        }
    }

    /// Phase label shown to the owner.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineStage::Queued => "Queued",
            PipelineStage::Downloading => "Downloading",
            PipelineStage::Transcoding => "Transcoding",
            PipelineStage::Scouting => "Scouting",
            PipelineStage::Uploading => "Uploading",
            PipelineStage::Finalizing => "Finalizing",
            PipelineStage::Completed => "Done",
            PipelineStage::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Completed | PipelineStage::Failed)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_forward_only() {
        use ProcessingStatus::*;

        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Failed));
        assert!(!Processing.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Processing));
    }

    #[test]
    fn test_stage_progress_increases() {
        let stages = [
            PipelineStage::Queued,
            PipelineStage::Downloading,
            PipelineStage::Transcoding,
            PipelineStage::Scouting,
            PipelineStage::Uploading,
            PipelineStage::Finalizing,
            PipelineStage::Completed,
        ];
        for pair in stages.windows(2) {
            assert!(pair[0].progress() < pair[1].progress());
        }
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ProcessingStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }
}
