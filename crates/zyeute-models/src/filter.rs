//! Named visual filters requested by the owner.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Visual filter hint carried by a job.
///
/// Unknown names deserialize to [`VisualFilter::None`]; the hint is cosmetic
/// and must never make a job invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VisualFilter {
    #[default]
    None,
    Vintage,
    Bright,
    Noir,
    Warm,
    Cool,
    Quebecois,
    Prestige,
    Nordic,
}

impl VisualFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisualFilter::None => "none",
            VisualFilter::Vintage => "vintage",
            VisualFilter::Bright => "bright",
            VisualFilter::Noir => "noir",
            VisualFilter::Warm => "warm",
            VisualFilter::Cool => "cool",
            VisualFilter::Quebecois => "quebecois",
            VisualFilter::Prestige => "prestige",
            VisualFilter::Nordic => "nordic",
        }
    }

    /// Parse leniently, case-insensitive.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "vintage" => VisualFilter::Vintage,
            "bright" => VisualFilter::Bright,
            "noir" => VisualFilter::Noir,
            "warm" => VisualFilter::Warm,
            "cool" => VisualFilter::Cool,
            "quebecois" | "québécois" => VisualFilter::Quebecois,
            "prestige" => VisualFilter::Prestige,
            "nordic" => VisualFilter::Nordic,
            _ => VisualFilter::None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, VisualFilter::None)
    }
}

impl<'de> Deserialize<'de> for VisualFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(VisualFilter::parse).unwrap_or_default())
    }
}

impl fmt::Display for VisualFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_parse() {
        assert_eq!(VisualFilter::parse("Noir"), VisualFilter::Noir);
        assert_eq!(VisualFilter::parse("québécois"), VisualFilter::Quebecois);
        assert_eq!(VisualFilter::parse("sparkles"), VisualFilter::None);
    }

    #[test]
    fn test_deserialize_unknown_and_null() {
        let f: VisualFilter = serde_json::from_str("\"glitter\"").unwrap();
        assert!(f.is_none());
        let f: VisualFilter = serde_json::from_str("null").unwrap();
        assert!(f.is_none());
        let f: VisualFilter = serde_json::from_str("\"warm\"").unwrap();
        assert_eq!(f, VisualFilter::Warm);
    }
}
