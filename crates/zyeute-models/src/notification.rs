//! Push notification messages sent to the content owner.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::status::PipelineStage;

/// Message published on the owner's notification channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Incremental progress (0-100) with a phase label
    Progress {
        #[serde(rename = "contentId")]
        content_id: String,
        percent: u8,
        phase: String,
        timestamp: DateTime<Utc>,
    },

    /// Terminal outcome; sent exactly once per job
    Completion {
        #[serde(rename = "contentId")]
        content_id: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

impl Notification {
    pub fn progress(content_id: impl Into<String>, percent: u8, phase: impl Into<String>) -> Self {
        Notification::Progress {
            content_id: content_id.into(),
            percent: percent.min(100),
            phase: phase.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn stage(content_id: impl Into<String>, stage: PipelineStage) -> Self {
        Self::progress(content_id, stage.progress(), stage.label())
    }

    pub fn success(content_id: impl Into<String>, url: impl Into<String>) -> Self {
        Notification::Completion {
            content_id: content_id.into(),
            success: true,
            url: Some(url.into()),
            message: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(content_id: impl Into<String>, message: impl Into<String>) -> Self {
        Notification::Completion {
            content_id: content_id.into(),
            success: false,
            url: None,
            message: Some(message.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn content_id(&self) -> &str {
        match self {
            Notification::Progress { content_id, .. } => content_id,
            Notification::Completion { content_id, .. } => content_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Notification::Completion { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_serialization() {
        let msg = Notification::stage("c1", PipelineStage::Uploading);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["contentId"], "c1");
        assert_eq!(json["percent"], 80);
        assert_eq!(json["phase"], "Uploading");
    }

    #[test]
    fn test_failure_has_no_url() {
        let msg = Notification::failure("c1", "rejected");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "completion");
        assert_eq!(json["success"], false);
        assert!(json.get("url").is_none());
        assert!(msg.is_terminal());
    }
}
