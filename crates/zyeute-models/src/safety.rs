//! Content safety verdicts.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Maximum number of descriptive tags kept from a verdict.
pub const MAX_SAFETY_TAGS: usize = 5;

/// Reason recorded when the safety service could not produce a verdict
/// and the pipeline was allowed to continue.
pub const UNDETERMINED_REASON: &str = "ai_error";

/// Structured verdict returned by the content safety service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SafetyVerdict {
    pub approved: bool,
    /// Violation category (e.g. "hate", "violence"); empty when approved.
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub vibe_category: String,
}

impl SafetyVerdict {
    pub fn approved(summary: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            approved: true,
            reason: String::new(),
            summary: summary.into(),
            tags,
            vibe_category: String::new(),
        }
        .normalized()
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            reason: reason.into(),
            summary: String::new(),
            tags: Vec::new(),
            vibe_category: String::new(),
        }
    }

    /// Verdict used when the service failed and policy let the content through.
    pub fn undetermined_pass() -> Self {
        Self {
            approved: true,
            reason: UNDETERMINED_REASON.to_string(),
            summary: String::new(),
            tags: Vec::new(),
            vibe_category: String::new(),
        }
    }

    /// Drop blank tags, cap them at [`MAX_SAFETY_TAGS`], and make sure a
    /// rejection always carries a reason.
    pub fn normalized(mut self) -> Self {
        self.tags.retain(|t| !t.trim().is_empty());
        self.tags.truncate(MAX_SAFETY_TAGS);
        if !self.approved && self.reason.trim().is_empty() {
            self.reason = "unspecified".to_string();
        }
        self
    }

    /// Flags persisted on the content record.
    pub fn to_flags(&self, checked_at: DateTime<Utc>) -> SafetyFlags {
        SafetyFlags {
            approved: self.approved,
            reason: self.reason.clone(),
            checked_at,
        }
    }
}

/// `safety_flags` column of the content record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SafetyFlags {
    pub approved: bool,
    pub reason: String,
    pub checked_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_capped() {
        let tags = (0..8).map(|i| format!("tag{i}")).collect();
        let verdict = SafetyVerdict::approved("a clip", tags);
        assert_eq!(verdict.tags.len(), MAX_SAFETY_TAGS);
    }

    #[test]
    fn test_rejection_always_has_reason() {
        let verdict = SafetyVerdict::rejected("").normalized();
        assert!(!verdict.approved);
        assert_eq!(verdict.reason, "unspecified");
    }

    #[test]
    fn test_flags_from_verdict() {
        let now = Utc::now();
        let flags = SafetyVerdict::rejected("hate").to_flags(now);
        assert!(!flags.approved);
        assert_eq!(flags.reason, "hate");
        assert_eq!(flags.checked_at, now);
    }

    #[test]
    fn test_deserialize_minimal_verdict() {
        let verdict: SafetyVerdict = serde_json::from_str(r#"{"approved":true}"#).unwrap();
        assert!(verdict.approved);
        assert!(verdict.tags.is_empty());
    }
}
