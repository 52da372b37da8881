//! Tracking policy loaded from `config/tracking.yaml`.
//!
//! Holds the models and personas each prompt is analyzed with, the weights
//! that turn a judged answer into a 0–100 visibility score, and the cut points
//! used by citation verification and trust trend classification.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Weights of the visibility score components. They must sum to 100.
///
/// * `mention`: awarded when the brand is named at all.
/// * `rank`: scaled by position; rank 1 earns the full weight, ranks past
///   `max_rank` earn nothing, an absent rank earns nothing.
/// * `sentiment`: positive earns the full weight, neutral half, negative none.
/// * `citations`: scaled by `min(citations, citation_cap) / citation_cap`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub mention: f64,
    pub rank: f64,
    pub sentiment: f64,
    pub citations: f64,
    pub max_rank: u32,
    pub citation_cap: u32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            mention: 40.0,
            rank: 30.0,
            sentiment: 20.0,
            citations: 10.0,
            max_rank: 10,
            citation_cap: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierThresholds {
    /// Similarity at or above which a citation is `verified`.
    pub high: f64,
    /// Similarity below which a citation is `hallucinated`.
    pub low: f64,
}

impl Default for VerifierThresholds {
    fn default() -> Self {
        Self {
            high: 0.7,
            low: 0.3,
        }
    }
}

/// Lower bounds of the low/medium/high risk buckets; anything under `high`
/// is very high risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskCutPoints {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl Default for RiskCutPoints {
    fn default() -> Self {
        Self {
            low: 0.75,
            medium: 0.5,
            high: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendPolicy {
    /// Authority deltas whose absolute value does not exceed this are `stable`.
    pub dead_band: f64,
    /// Consecutive missing days tolerated before they count as an outage.
    pub outage_grace_days: u32,
    pub projection_days: u32,
}

impl Default for TrendPolicy {
    fn default() -> Self {
        Self {
            dead_band: 0.02,
            outage_grace_days: 1,
            projection_days: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingPolicy {
    pub models: Vec<String>,
    pub personas: Vec<String>,
    pub scoring: ScoringWeights,
    pub verifier: VerifierThresholds,
    pub risk: RiskCutPoints,
    pub trends: TrendPolicy,
}

impl Default for TrackingPolicy {
    fn default() -> Self {
        Self {
            models: vec!["gpt-4o-mini".to_string()],
            personas: vec!["default".to_string()],
            scoring: ScoringWeights::default(),
            verifier: VerifierThresholds::default(),
            risk: RiskCutPoints::default(),
            trends: TrendPolicy::default(),
        }
    }
}

/// Load and validate the tracking policy from a YAML file.
///
/// A missing file yields [`TrackingPolicy::default`].
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read, parsed, or
/// fails validation.
pub fn load_tracking_policy(path: &Path) -> Result<TrackingPolicy, ConfigError> {
    if !path.exists() {
        return Ok(TrackingPolicy::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::PolicyFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_tracking_policy(&content)
}

/// Parse and validate a tracking policy from YAML text.
///
/// # Errors
///
/// Returns `ConfigError` on parse or validation failure.
pub fn parse_tracking_policy(content: &str) -> Result<TrackingPolicy, ConfigError> {
    let policy: TrackingPolicy = serde_yaml::from_str(content)?;
    validate_policy(&policy)?;
    Ok(policy)
}

fn validate_policy(policy: &TrackingPolicy) -> Result<(), ConfigError> {
    validate_names("models", &policy.models)?;
    validate_names("personas", &policy.personas)?;

    let w = &policy.scoring;
    for (name, value) in [
        ("mention", w.mention),
        ("rank", w.rank),
        ("sentiment", w.sentiment),
        ("citations", w.citations),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::Validation(format!(
                "scoring weight '{name}' must be a non-negative number, got {value}"
            )));
        }
    }
    let total = w.mention + w.rank + w.sentiment + w.citations;
    if (total - 100.0).abs() > 1e-6 {
        return Err(ConfigError::Validation(format!(
            "scoring weights must sum to 100, got {total}"
        )));
    }
    if w.max_rank == 0 || w.citation_cap == 0 {
        return Err(ConfigError::Validation(
            "scoring max_rank and citation_cap must be at least 1".to_string(),
        ));
    }

    let v = &policy.verifier;
    if !(0.0..=1.0).contains(&v.low) || !(0.0..=1.0).contains(&v.high) || v.low >= v.high {
        return Err(ConfigError::Validation(format!(
            "verifier thresholds must satisfy 0 <= low < high <= 1, got low={} high={}",
            v.low, v.high
        )));
    }

    let r = &policy.risk;
    if !(r.low > r.medium && r.medium > r.high && r.high > 0.0 && r.low <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "risk cut points must satisfy 1 >= low > medium > high > 0, got {}/{}/{}",
            r.low, r.medium, r.high
        )));
    }

    if !policy.trends.dead_band.is_finite() || policy.trends.dead_band < 0.0 {
        return Err(ConfigError::Validation(
            "trends dead_band must be non-negative".to_string(),
        ));
    }

    Ok(())
}

fn validate_names(field: &str, names: &[String]) -> Result<(), ConfigError> {
    if names.is_empty() {
        return Err(ConfigError::Validation(format!("{field} must be non-empty")));
    }
    let mut seen = HashSet::new();
    for name in names {
        if name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{field} entries must be non-empty"
            )));
        }
        if !seen.insert(name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate entry in {field}: '{name}'"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_valid() {
        validate_policy(&TrackingPolicy::default()).expect("defaults must validate");
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = "models: [gpt-4o, claude-sonnet]\nverifier:\n  high: 0.8\n";
        let policy = parse_tracking_policy(yaml).unwrap();
        assert_eq!(policy.models, vec!["gpt-4o", "claude-sonnet"]);
        assert_eq!(policy.personas, vec!["default"]);
        assert!((policy.verifier.high - 0.8).abs() < f64::EPSILON);
        assert!((policy.verifier.low - 0.3).abs() < f64::EPSILON);
        assert_eq!(policy.scoring, ScoringWeights::default());
    }

    #[test]
    fn rejects_weights_not_summing_to_100() {
        let yaml = "scoring:\n  mention: 50\n  rank: 30\n  sentiment: 20\n  citations: 10\n";
        let err = parse_tracking_policy(yaml).unwrap_err();
        assert!(err.to_string().contains("sum to 100"), "{err}");
    }

    #[test]
    fn rejects_negative_weight() {
        let yaml = "scoring:\n  mention: 80\n  rank: 30\n  sentiment: -20\n  citations: 10\n";
        let err = parse_tracking_policy(yaml).unwrap_err();
        assert!(err.to_string().contains("non-negative"), "{err}");
    }

    #[test]
    fn rejects_inverted_verifier_thresholds() {
        let yaml = "verifier:\n  high: 0.2\n  low: 0.4\n";
        assert!(parse_tracking_policy(yaml).is_err());
    }

    #[test]
    fn rejects_duplicate_models() {
        let yaml = "models: [gpt-4o, GPT-4o]\n";
        let err = parse_tracking_policy(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate"), "{err}");
    }

    #[test]
    fn rejects_empty_personas() {
        let yaml = "personas: []\n";
        assert!(parse_tracking_policy(yaml).is_err());
    }

    #[test]
    fn missing_file_yields_default() {
        let policy =
            load_tracking_policy(Path::new("/nonexistent/aivis/tracking.yaml")).unwrap();
        assert_eq!(policy, TrackingPolicy::default());
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = parse_tracking_policy("models: [unterminated").unwrap_err();
        assert!(matches!(err, ConfigError::PolicyFileParse(_)));
    }
}
