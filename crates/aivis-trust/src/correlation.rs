//! Cross-engine agreement over shared queries.

use std::collections::BTreeMap;

use aivis_core::EngineCorrelation;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::stats::{pearson, round6};

/// How one engine did on one query during the period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineQueryOutcome {
    pub engine: String,
    /// Stable identifier of the query, typically the prompt id.
    pub query: String,
    /// Per-query authority proxy in `[0, 1]` (visibility score / 100).
    pub score: f64,
    pub brand_mentioned: bool,
    pub rank: Option<u32>,
}

#[derive(Debug, Clone, Copy)]
struct QueryAgg {
    score_sum: f64,
    runs: u32,
    mentioned: bool,
    best_rank: Option<u32>,
}

impl QueryAgg {
    fn score(&self) -> f64 {
        self.score_sum / f64::from(self.runs.max(1))
    }
}

/// Multiple runs of the same query collapse into one outcome: mean score,
/// mentioned if any run mentioned, best rank seen.
fn aggregate(outcomes: &[EngineQueryOutcome]) -> BTreeMap<&str, BTreeMap<&str, QueryAgg>> {
    let mut by_engine: BTreeMap<&str, BTreeMap<&str, QueryAgg>> = BTreeMap::new();
    for o in outcomes {
        let agg = by_engine
            .entry(o.engine.as_str())
            .or_default()
            .entry(o.query.as_str())
            .or_insert(QueryAgg {
                score_sum: 0.0,
                runs: 0,
                mentioned: false,
                best_rank: None,
            });
        agg.score_sum += o.score;
        agg.runs += 1;
        agg.mentioned |= o.brand_mentioned;
        agg.best_rank = match (agg.best_rank, o.rank) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
    }
    by_engine
}

/// `true` when `a` placed the brand better than `b`: mentioned beats not
/// mentioned, then a lower rank wins.
fn ranks_better(a: &QueryAgg, b: &QueryAgg) -> bool {
    match (a.mentioned, b.mentioned) {
        (true, false) => true,
        (false, true) | (false, false) => false,
        (true, true) => match (a.best_rank, b.best_rank) {
            (Some(ra), Some(rb)) => ra < rb,
            (Some(_), None) => true,
            _ => false,
        },
    }
}

#[allow(clippy::cast_precision_loss)]
fn fraction(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round6(part as f64 / whole as f64)
    }
}

/// One [`EngineCorrelation`] per engine pair (`engine_a < engine_b`) that
/// shares at least one query. Pairs with no overlap produce no entry.
///
/// Output is sorted by `(engine_a, engine_b)`, so identical input always
/// produces identical rows.
#[must_use]
pub fn compute_engine_correlations(
    outcomes: &[EngineQueryOutcome],
    period_start: NaiveDate,
    period_end: NaiveDate,
) -> Vec<EngineCorrelation> {
    let by_engine = aggregate(outcomes);
    let engines: Vec<(&str, &BTreeMap<&str, QueryAgg>)> =
        by_engine.iter().map(|(e, q)| (*e, q)).collect();

    let mut rows = Vec::new();
    for (i, (engine_a, queries_a)) in engines.iter().enumerate() {
        for (engine_b, queries_b) in &engines[i + 1..] {
            let shared: Vec<(&QueryAgg, &QueryAgg)> = queries_a
                .iter()
                .filter_map(|(q, a)| queries_b.get(q).map(|b| (a, b)))
                .collect();
            if shared.is_empty() {
                continue;
            }

            let xs: Vec<f64> = shared.iter().map(|(a, _)| a.score()).collect();
            let ys: Vec<f64> = shared.iter().map(|(_, b)| b.score()).collect();
            let disagreements: Vec<&(&QueryAgg, &QueryAgg)> = shared
                .iter()
                .filter(|(a, b)| a.mentioned != b.mentioned)
                .collect();
            let wins_a = disagreements
                .iter()
                .filter(|(a, b)| ranks_better(a, b))
                .count();
            let wins_b = disagreements
                .iter()
                .filter(|(a, b)| ranks_better(b, a))
                .count();

            rows.push(EngineCorrelation {
                engine_a: (*engine_a).to_string(),
                engine_b: (*engine_b).to_string(),
                period_start,
                period_end,
                shared_queries: i32::try_from(shared.len()).unwrap_or(i32::MAX),
                correlation: pearson(&xs, &ys).map(round6),
                disagreement_frequency: fraction(disagreements.len(), shared.len()),
                win_rate_a: fraction(wins_a, disagreements.len()),
                win_rate_b: fraction(wins_b, disagreements.len()),
            });
        }
    }

    if rows.is_empty() && by_engine.len() > 1 {
        tracing::warn!(
            engines = by_engine.len(),
            "no engine pair shares a query in period, no correlations computed"
        );
    }
    rows
}
