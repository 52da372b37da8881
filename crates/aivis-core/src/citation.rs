//! Citation structures shared by the analysis, trust, and storage layers.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// A single source cited in an engine's answer.
///
/// `position` is the 1-based order in which the citation appeared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(alias = "link")]
    pub url: String,
    #[serde(default)]
    pub snippet: Option<String>,
    pub position: u32,
}

/// Verification state of a ledger URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Unverified,
    Hallucinated,
}

impl VerificationStatus {
    pub const ALL: [VerificationStatus; 4] = [
        VerificationStatus::Pending,
        VerificationStatus::Verified,
        VerificationStatus::Unverified,
        VerificationStatus::Hallucinated,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Unverified => "unverified",
            VerificationStatus::Hallucinated => "hallucinated",
        }
    }

    /// Trust scores are only meaningful once a citation has been checked.
    #[must_use]
    pub fn has_trust_score(self) -> bool {
        self != VerificationStatus::Pending
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(VerificationStatus::Pending),
            "verified" => Ok(VerificationStatus::Verified),
            "unverified" => Ok(VerificationStatus::Unverified),
            "hallucinated" => Ok(VerificationStatus::Hallucinated),
            other => Err(CoreError::UnknownValue {
                kind: "verification status",
                value: other.to_string(),
            }),
        }
    }
}

/// Reporting bucket derived from a trust score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HallucinationRisk {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl HallucinationRisk {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HallucinationRisk::Low => "low",
            HallucinationRisk::Medium => "medium",
            HallucinationRisk::High => "high",
            HallucinationRisk::VeryHigh => "very_high",
        }
    }
}

impl std::fmt::Display for HallucinationRisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn citation_accepts_link_alias() {
        let json = r#"{"title":"Docs","link":"https://example.com/a","position":2}"#;
        let citation: Citation = serde_json::from_str(json).unwrap();
        assert_eq!(citation.url, "https://example.com/a");
        assert_eq!(citation.position, 2);
        assert!(citation.snippet.is_none());
    }

    #[test]
    fn citation_serializes_url_field() {
        let citation = Citation {
            title: None,
            url: "https://example.com".to_string(),
            snippet: Some("intro".to_string()),
            position: 1,
        };
        let value = serde_json::to_value(&citation).unwrap();
        assert_eq!(value["url"], "https://example.com");
        assert!(value.get("link").is_none());
    }

    #[test]
    fn only_pending_lacks_trust_score() {
        assert!(!VerificationStatus::Pending.has_trust_score());
        assert!(VerificationStatus::Hallucinated.has_trust_score());
    }

    #[test]
    fn status_parse_rejects_unknown() {
        assert_eq!(
            "verified".parse::<VerificationStatus>().unwrap(),
            VerificationStatus::Verified
        );
        assert!("maybe".parse::<VerificationStatus>().is_err());
    }

    #[test]
    fn risk_serializes_snake_case() {
        let json = serde_json::to_string(&HallucinationRisk::VeryHigh).unwrap();
        assert_eq!(json, "\"very_high\"");
    }
}
