//! Daily per-engine trust snapshot.

use aivis_core::TrustSnapshot;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::stats::{mean, round6};

const RELIABILITY_WEIGHT: f64 = 0.4;
const COMPLETENESS_WEIGHT: f64 = 0.3;
const SUCCESS_WEIGHT: f64 = 0.2;
const FRESHNESS_WEIGHT: f64 = 0.1;

/// Everything observed for one engine on one day, as counted by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineDayObservations {
    pub engine: String,
    pub date: NaiveDate,
    /// Trust scores of the day's cited URLs that have left `pending`.
    pub checked_trust_scores: Vec<f64>,
    pub results_total: i64,
    pub results_with_citations: i64,
    pub cited_urls_total: i64,
    /// Cited URLs first seen within the freshness horizon.
    pub cited_urls_fresh: i64,
    pub jobs_complete: i64,
    /// Jobs that reached `complete` or `failed`.
    pub jobs_terminal: i64,
}

#[allow(clippy::cast_precision_loss)]
fn ratio(part: i64, whole: i64) -> Option<f64> {
    if whole <= 0 {
        return None;
    }
    Some((part.max(0) as f64 / whole as f64).clamp(0.0, 1.0))
}

/// Aggregate one engine-day into a [`TrustSnapshot`].
///
/// Components with nothing to aggregate resolve to 0 and are logged rather
/// than returned as errors.
#[must_use]
pub fn compute_trust_snapshot(obs: &EngineDayObservations) -> TrustSnapshot {
    let component = |name: &str, value: Option<f64>| {
        value.unwrap_or_else(|| {
            tracing::warn!(
                engine = %obs.engine,
                date = %obs.date,
                component = name,
                "no observations for trust component, using 0"
            );
            0.0
        })
    };

    let reliability = component("reliability", mean(&obs.checked_trust_scores))
        .clamp(0.0, 1.0);
    let completeness = component(
        "completeness",
        ratio(obs.results_with_citations, obs.results_total),
    );
    let freshness = component("freshness", ratio(obs.cited_urls_fresh, obs.cited_urls_total));
    let success = component("success_rate", ratio(obs.jobs_complete, obs.jobs_terminal));

    let authority = RELIABILITY_WEIGHT * reliability
        + COMPLETENESS_WEIGHT * completeness
        + SUCCESS_WEIGHT * success
        + FRESHNESS_WEIGHT * freshness;

    TrustSnapshot {
        engine: obs.engine.clone(),
        snapshot_date: obs.date,
        reliability_score: round6(reliability),
        citation_completeness: round6(completeness),
        freshness_index: round6(freshness),
        authority_weight: round6(authority),
        query_volume: obs.jobs_terminal.max(0),
        success_rate: round6(success),
    }
}
