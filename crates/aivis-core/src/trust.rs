//! Derived trust rows: daily snapshots, windowed trends, engine correlations.

use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TrustWindow {
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
}

impl TrustWindow {
    pub const ALL: [TrustWindow; 3] = [TrustWindow::Week, TrustWindow::Month, TrustWindow::Quarter];

    #[must_use]
    pub fn days(self) -> i64 {
        match self {
            TrustWindow::Week => 7,
            TrustWindow::Month => 30,
            TrustWindow::Quarter => 90,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TrustWindow::Week => "7d",
            TrustWindow::Month => "30d",
            TrustWindow::Quarter => "90d",
        }
    }
}

impl std::fmt::Display for TrustWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrustWindow {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "7d" => Ok(TrustWindow::Week),
            "30d" => Ok(TrustWindow::Month),
            "90d" => Ok(TrustWindow::Quarter),
            other => Err(CoreError::UnknownValue {
                kind: "trust window",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Stable,
    Declining,
}

impl TrendDirection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TrendDirection::Improving => "improving",
            TrendDirection::Stable => "stable",
            TrendDirection::Declining => "declining",
        }
    }
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrendDirection {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "improving" => Ok(TrendDirection::Improving),
            "stable" => Ok(TrendDirection::Stable),
            "declining" => Ok(TrendDirection::Declining),
            other => Err(CoreError::UnknownValue {
                kind: "trend direction",
                value: other.to_string(),
            }),
        }
    }
}

/// Per-engine, per-day trust aggregate. All ratios are in `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustSnapshot {
    pub engine: String,
    pub snapshot_date: NaiveDate,
    pub reliability_score: f64,
    pub citation_completeness: f64,
    pub freshness_index: f64,
    pub authority_weight: f64,
    pub query_volume: i64,
    pub success_rate: f64,
}

/// Trend of one engine's authority over a window ending at `as_of`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustTrend {
    pub engine: String,
    pub window: TrustWindow,
    pub as_of: NaiveDate,
    pub authority_delta: f64,
    pub direction: TrendDirection,
    pub reliability_delta: f64,
    pub volatility: f64,
    pub outage_count: i32,
    pub outage_minutes: i64,
    pub current_authority: f64,
    pub projected_authority: Option<f64>,
}

/// Agreement statistics for an unordered engine pair; `engine_a < engine_b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineCorrelation {
    pub engine_a: String,
    pub engine_b: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub shared_queries: i32,
    /// `None` when fewer than two shared queries or either series is constant.
    pub correlation: Option<f64>,
    pub disagreement_frequency: f64,
    pub win_rate_a: f64,
    pub win_rate_b: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_days_and_labels() {
        assert_eq!(TrustWindow::Week.days(), 7);
        assert_eq!(TrustWindow::Quarter.as_str(), "90d");
        assert_eq!("30d".parse::<TrustWindow>().unwrap(), TrustWindow::Month);
        assert!("1y".parse::<TrustWindow>().is_err());
    }

    #[test]
    fn window_serializes_as_label() {
        assert_eq!(serde_json::to_string(&TrustWindow::Month).unwrap(), "\"30d\"");
    }

    #[test]
    fn direction_round_trips() {
        for d in [
            TrendDirection::Improving,
            TrendDirection::Stable,
            TrendDirection::Declining,
        ] {
            assert_eq!(d.as_str().parse::<TrendDirection>().unwrap(), d);
        }
    }
}
