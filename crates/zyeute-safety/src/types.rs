//! Safety service request/response types.

use serde::{Deserialize, Serialize};

use zyeute_models::{MediaKind, SafetyVerdict};

/// Request body for `POST /analyze`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub content_id: String,
    pub media_kind: MediaKind,
    pub mime_type: String,
    /// Base64-encoded rendition bytes
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// Response body from `POST /analyze`.
///
/// `approved` is required: a body without it is a protocol error, not a pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    #[serde(alias = "safetyApproved")]
    pub approved: bool,
    #[serde(default, alias = "safetyReason")]
    pub reason: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, alias = "vibeCategory", alias = "vibe")]
    pub vibe_category: String,
}

impl From<AnalyzeResponse> for SafetyVerdict {
    fn from(r: AnalyzeResponse) -> Self {
        SafetyVerdict {
            approved: r.approved,
            reason: if r.approved {
                String::new()
            } else {
                r.reason.unwrap_or_default()
            },
            summary: r.summary,
            tags: r.tags,
            vibe_category: r.vibe_category,
        }
        .normalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case_response() {
        let body = r#"{"summary":"Poutine time","tags":["food","mtl","a","b","c","d"],"vibe":"chill","safetyApproved":true}"#;
        let resp: AnalyzeResponse = serde_json::from_str(body).unwrap();
        let verdict = SafetyVerdict::from(resp);
        assert!(verdict.approved);
        assert_eq!(verdict.vibe_category, "chill");
        assert_eq!(verdict.tags.len(), 5);
    }

    #[test]
    fn test_rejection_reason_kept() {
        let body = r#"{"approved":false,"reason":"hate"}"#;
        let verdict = SafetyVerdict::from(serde_json::from_str::<AnalyzeResponse>(body).unwrap());
        assert!(!verdict.approved);
        assert_eq!(verdict.reason, "hate");
    }

    #[test]
    fn test_missing_approval_is_an_error() {
        let body = r#"{"summary":"x","tags":[]}"#;
        assert!(serde_json::from_str::<AnalyzeResponse>(body).is_err());
    }
}
