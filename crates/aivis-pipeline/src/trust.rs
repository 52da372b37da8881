//! Daily trust recomputation: snapshots, windowed trends, engine
//! correlations and category trends.

use std::collections::BTreeMap;

use aivis_core::{TrendPolicy, TrustSnapshot, TrustWindow};
use aivis_db::{
    CategoryVisibilityRow, ChangeFeed, ChangeOp, EngineDayCountsRow, EngineQueryOutcomeRow,
    EntityKind,
};
use aivis_trust::{
    calculate_trust_trends, compute_category_trends, compute_engine_correlations,
    compute_trust_snapshot, CategoryTrend, CategoryVisibility, EngineDayObservations,
    EngineQueryOutcome,
};
use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::error::PipelineError;

/// Cited URLs first seen within this many days count as fresh.
const FRESHNESS_DAYS: i32 = 30;
/// Period over which engine pairs are correlated.
const CORRELATION_DAYS: i64 = 30;
/// Category trends are reported for this window.
const CATEGORY_WINDOW: TrustWindow = TrustWindow::Week;

#[derive(Debug, Clone, Serialize)]
pub struct TrustRecomputeSummary {
    pub date: NaiveDate,
    pub snapshots: usize,
    pub trends: usize,
    pub correlations: usize,
    pub categories: Vec<CategoryTrend>,
}

/// Merge per-engine counts and checked trust scores for one day. Engines that
/// appear in either input get an entry, in name order.
#[must_use]
pub fn observations_for_day(
    date: NaiveDate,
    counts: &[EngineDayCountsRow],
    trust_scores: &[(String, f64)],
) -> Vec<EngineDayObservations> {
    let mut by_engine: BTreeMap<&str, EngineDayObservations> = BTreeMap::new();
    for row in counts {
        let obs = by_engine
            .entry(row.engine.as_str())
            .or_insert_with(|| blank(&row.engine, date));
        obs.jobs_complete = row.jobs_complete;
        obs.jobs_terminal = row.jobs_terminal;
        obs.results_total = row.results_total;
        obs.results_with_citations = row.results_with_citations;
        obs.cited_urls_total = row.cited_urls_total;
        obs.cited_urls_fresh = row.cited_urls_fresh;
    }
    for (engine, score) in trust_scores {
        by_engine
            .entry(engine.as_str())
            .or_insert_with(|| blank(engine, date))
            .checked_trust_scores
            .push(*score);
    }
    by_engine.into_values().collect()
}

fn blank(engine: &str, date: NaiveDate) -> EngineDayObservations {
    EngineDayObservations {
        engine: engine.to_string(),
        date,
        ..EngineDayObservations::default()
    }
}

/// Prompt results as per-query outcomes; scores are rescaled to `[0, 1]`.
#[must_use]
pub fn query_outcomes(rows: &[EngineQueryOutcomeRow]) -> Vec<EngineQueryOutcome> {
    rows.iter()
        .map(|row| EngineQueryOutcome {
            engine: row.engine.clone(),
            query: row.prompt_id.to_string(),
            score: (aivis_db::from_decimal(row.visibility_score) / 100.0).clamp(0.0, 1.0),
            brand_mentioned: row.brand_mentioned,
            rank: row.rank.and_then(|r| u32::try_from(r).ok()),
        })
        .collect()
}

#[must_use]
pub fn category_points(rows: &[CategoryVisibilityRow]) -> Vec<CategoryVisibility> {
    rows.iter()
        .map(|row| CategoryVisibility {
            category: row.category.clone(),
            recorded_on: row.recorded_on,
            score: aivis_db::from_decimal(row.visibility_score),
        })
        .collect()
}

fn group_by_engine(snapshots: Vec<TrustSnapshot>) -> BTreeMap<String, Vec<TrustSnapshot>> {
    let mut grouped: BTreeMap<String, Vec<TrustSnapshot>> = BTreeMap::new();
    for snapshot in snapshots {
        grouped
            .entry(snapshot.engine.clone())
            .or_default()
            .push(snapshot);
    }
    grouped
}

/// Recompute every derived trust row for `date`, overwriting what was there.
///
/// Running it twice over unchanged history writes identical rows.
///
/// # Errors
///
/// Returns [`PipelineError::Db`] on the first failed read or write; rows
/// written before the failure stay individually valid.
pub async fn recompute_trust(
    pool: &PgPool,
    date: NaiveDate,
    policy: &TrendPolicy,
    feed: Option<&ChangeFeed>,
) -> Result<TrustRecomputeSummary, PipelineError> {
    let computed_at = Utc::now();

    // Snapshots for the day
    let counts = aivis_db::engine_day_counts(pool, date, FRESHNESS_DAYS).await?;
    let trust_scores: Vec<(String, f64)> = aivis_db::engine_day_trust_scores(pool, date)
        .await?
        .into_iter()
        .map(|(engine, score)| (engine, aivis_db::from_decimal(score)))
        .collect();
    let observations = observations_for_day(date, &counts, &trust_scores);
    for obs in &observations {
        let snapshot = compute_trust_snapshot(obs);
        aivis_db::upsert_trust_snapshot(pool, &snapshot, computed_at).await?;
    }

    // Trends over every window
    let history_start = date - Duration::days(TrustWindow::Quarter.days() - 1);
    let history = aivis_db::list_trust_snapshots(pool, None, history_start, date).await?;
    let mut trends = 0;
    for (engine, snapshots) in &group_by_engine(history) {
        for window in TrustWindow::ALL {
            let trend = calculate_trust_trends(engine, window, date, snapshots, policy);
            aivis_db::upsert_trust_trend(pool, &trend, computed_at).await?;
            if let Some(feed) = feed {
                feed.publish(
                    None,
                    EntityKind::TrustTrend,
                    format!("{engine}/{window}"),
                    ChangeOp::Upsert,
                    serde_json::to_value(&trend)?,
                );
            }
            trends += 1;
        }
    }

    // Engine pair correlations
    let period_start = date - Duration::days(CORRELATION_DAYS - 1);
    let outcome_rows = aivis_db::engine_query_outcomes(pool, period_start, date).await?;
    let correlations =
        compute_engine_correlations(&query_outcomes(&outcome_rows), period_start, date);
    for correlation in &correlations {
        aivis_db::upsert_engine_correlation(pool, correlation, computed_at).await?;
    }

    // Category trends
    let since = date - Duration::days(CATEGORY_WINDOW.days() * 2 - 1);
    let category_rows = aivis_db::list_category_visibility(pool, since).await?;
    let categories = compute_category_trends(
        &category_points(&category_rows),
        CATEGORY_WINDOW,
        date,
        policy.dead_band * 100.0,
    );

    tracing::info!(
        %date,
        snapshots = observations.len(),
        trends,
        correlations = correlations.len(),
        categories = categories.len(),
        "trust recomputation complete"
    );
    Ok(TrustRecomputeSummary {
        date,
        snapshots: observations.len(),
        trends,
        correlations: correlations.len(),
        categories,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    fn counts(engine: &str, complete: i64, terminal: i64) -> EngineDayCountsRow {
        EngineDayCountsRow {
            engine: engine.to_string(),
            jobs_complete: complete,
            jobs_terminal: terminal,
            results_total: complete,
            results_with_citations: complete,
            cited_urls_total: 2,
            cited_urls_fresh: 1,
        }
    }

    #[test]
    fn observations_merge_counts_and_scores() {
        let obs = observations_for_day(
            day(),
            &[counts("gpt-4o", 3, 4)],
            &[
                ("gpt-4o".to_string(), 0.8),
                ("gpt-4o".to_string(), 0.6),
                ("claude".to_string(), 0.9),
            ],
        );
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].engine, "claude");
        assert_eq!(obs[0].jobs_terminal, 0);
        assert_eq!(obs[1].engine, "gpt-4o");
        assert_eq!(obs[1].jobs_complete, 3);
        assert_eq!(obs[1].checked_trust_scores, vec![0.8, 0.6]);
        assert_eq!(obs[1].date, day());
    }

    #[test]
    fn outcomes_rescale_and_drop_negative_ranks() {
        let rows = vec![EngineQueryOutcomeRow {
            engine: "gpt-4o".to_string(),
            prompt_id: 12,
            visibility_score: aivis_db::to_decimal(74.0, 2),
            brand_mentioned: true,
            rank: Some(-1),
        }];
        let outcomes = query_outcomes(&rows);
        assert_eq!(outcomes[0].query, "12");
        assert!((outcomes[0].score - 0.74).abs() < 1e-9);
        assert_eq!(outcomes[0].rank, None);
    }

    #[test]
    fn snapshots_group_per_engine() {
        let snap = |engine: &str| TrustSnapshot {
            engine: engine.to_string(),
            snapshot_date: day(),
            reliability_score: 0.5,
            citation_completeness: 0.5,
            freshness_index: 0.5,
            authority_weight: 0.5,
            query_volume: 1,
            success_rate: 1.0,
        };
        let grouped = group_by_engine(vec![snap("b"), snap("a"), snap("b")]);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["b"].len(), 2);
    }
}
