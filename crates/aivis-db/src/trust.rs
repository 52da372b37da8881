//! Derived trust rows and the source aggregates they are computed from.
//!
//! Every write here is an `ON CONFLICT ... DO UPDATE` on the row's natural
//! key, so recomputation overwrites instead of accumulating.

use aivis_core::{EngineCorrelation, TrendDirection, TrustSnapshot, TrustTrend, TrustWindow};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::decimal::{from_decimal, to_decimal};
use crate::DbError;

const RATIO_SCALE: u32 = 6;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, sqlx::FromRow)]
struct TrustSnapshotRow {
    engine: String,
    snapshot_date: NaiveDate,
    reliability_score: Decimal,
    citation_completeness: Decimal,
    freshness_index: Decimal,
    authority_weight: Decimal,
    query_volume: i64,
    success_rate: Decimal,
}

impl From<TrustSnapshotRow> for TrustSnapshot {
    fn from(row: TrustSnapshotRow) -> Self {
        Self {
            engine: row.engine,
            snapshot_date: row.snapshot_date,
            reliability_score: from_decimal(row.reliability_score),
            citation_completeness: from_decimal(row.citation_completeness),
            freshness_index: from_decimal(row.freshness_index),
            authority_weight: from_decimal(row.authority_weight),
            query_volume: row.query_volume,
            success_rate: from_decimal(row.success_rate),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct TrustTrendRow {
    engine: String,
    window_label: String,
    as_of: NaiveDate,
    authority_delta: Decimal,
    direction: String,
    reliability_delta: Decimal,
    volatility: Decimal,
    outage_count: i32,
    outage_minutes: i64,
    current_authority: Decimal,
    projected_authority: Option<Decimal>,
}

impl TryFrom<TrustTrendRow> for TrustTrend {
    type Error = DbError;

    fn try_from(row: TrustTrendRow) -> Result<Self, Self::Error> {
        let window: TrustWindow =
            row.window_label
                .parse()
                .map_err(|e: aivis_core::CoreError| DbError::InvalidValue {
                    column: "trust_trends.window_label",
                    reason: e.to_string(),
                })?;
        let direction: TrendDirection =
            row.direction
                .parse()
                .map_err(|e: aivis_core::CoreError| DbError::InvalidValue {
                    column: "trust_trends.direction",
                    reason: e.to_string(),
                })?;
        Ok(Self {
            engine: row.engine,
            window,
            as_of: row.as_of,
            authority_delta: from_decimal(row.authority_delta),
            direction,
            reliability_delta: from_decimal(row.reliability_delta),
            volatility: from_decimal(row.volatility),
            outage_count: row.outage_count,
            outage_minutes: row.outage_minutes,
            current_authority: from_decimal(row.current_authority),
            projected_authority: row.projected_authority.map(from_decimal),
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct EngineCorrelationRow {
    engine_a: String,
    engine_b: String,
    period_start: NaiveDate,
    period_end: NaiveDate,
    shared_queries: i32,
    correlation: Option<Decimal>,
    disagreement_frequency: Decimal,
    win_rate_a: Decimal,
    win_rate_b: Decimal,
}

impl From<EngineCorrelationRow> for EngineCorrelation {
    fn from(row: EngineCorrelationRow) -> Self {
        Self {
            engine_a: row.engine_a,
            engine_b: row.engine_b,
            period_start: row.period_start,
            period_end: row.period_end,
            shared_queries: row.shared_queries,
            correlation: row.correlation.map(from_decimal),
            disagreement_frequency: from_decimal(row.disagreement_frequency),
            win_rate_a: from_decimal(row.win_rate_a),
            win_rate_b: from_decimal(row.win_rate_b),
        }
    }
}

/// Per-engine counts for one UTC day, the raw input of a trust snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct EngineDayCountsRow {
    pub engine: String,
    pub jobs_complete: i64,
    pub jobs_terminal: i64,
    pub results_total: i64,
    pub results_with_citations: i64,
    pub cited_urls_total: i64,
    pub cited_urls_fresh: i64,
}

/// One completed run, as used by cross-engine correlation.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EngineQueryOutcomeRow {
    pub engine: String,
    pub prompt_id: i64,
    pub visibility_score: Decimal,
    pub brand_mentioned: bool,
    pub rank: Option<i32>,
}

// ---------------------------------------------------------------------------
// Source aggregates
// ---------------------------------------------------------------------------

/// Counts per engine (model) for `date`. Engines with no terminal job and no
/// result that day are absent.
///
/// Cited URLs are the ledger rows the engine has cited, first seen on or
/// before `date`; fresh ones were first seen within `fresh_days` of it.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn engine_day_counts(
    pool: &PgPool,
    date: NaiveDate,
    fresh_days: i32,
) -> Result<Vec<EngineDayCountsRow>, DbError> {
    let rows = sqlx::query_as::<_, EngineDayCountsRow>(
        "WITH jobs AS ( \
             SELECT model AS engine, \
                    COUNT(*) FILTER (WHERE phase = 'complete') AS jobs_complete, \
                    COUNT(*) AS jobs_terminal \
             FROM analysis_jobs \
             WHERE completed_at IS NOT NULL \
               AND (completed_at AT TIME ZONE 'UTC')::date = $1 \
             GROUP BY model \
         ), results AS ( \
             SELECT model AS engine, \
                    COUNT(*) AS results_total, \
                    COUNT(*) FILTER (WHERE jsonb_array_length(citations) > 0) \
                        AS results_with_citations \
             FROM prompt_results \
             WHERE (created_at AT TIME ZONE 'UTC')::date = $1 \
             GROUP BY model \
         ), engines AS ( \
             SELECT engine FROM jobs UNION SELECT engine FROM results \
         ) \
         SELECT e.engine, \
                COALESCE(j.jobs_complete, 0) AS jobs_complete, \
                COALESCE(j.jobs_terminal, 0) AS jobs_terminal, \
                COALESCE(r.results_total, 0) AS results_total, \
                COALESCE(r.results_with_citations, 0) AS results_with_citations, \
                ( SELECT COUNT(*) FROM url_citations u \
                  WHERE e.engine = ANY(u.engines) \
                    AND (u.first_seen_at AT TIME ZONE 'UTC')::date <= $1 ) AS cited_urls_total, \
                ( SELECT COUNT(*) FROM url_citations u \
                  WHERE e.engine = ANY(u.engines) \
                    AND (u.first_seen_at AT TIME ZONE 'UTC')::date <= $1 \
                    AND (u.first_seen_at AT TIME ZONE 'UTC')::date > $1 - $2::int ) \
                  AS cited_urls_fresh \
         FROM engines e \
         LEFT JOIN jobs j ON j.engine = e.engine \
         LEFT JOIN results r ON r.engine = e.engine \
         ORDER BY e.engine",
    )
    .bind(date)
    .bind(fresh_days)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Trust scores of checked ledger URLs cited by each engine, first seen on
/// or before `date`. Returns `(engine, trust_score)` pairs.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn engine_day_trust_scores(
    pool: &PgPool,
    date: NaiveDate,
) -> Result<Vec<(String, Decimal)>, DbError> {
    let rows = sqlx::query_as::<_, (String, Decimal)>(
        "SELECT e.engine, u.trust_score \
         FROM url_citations u \
         CROSS JOIN LATERAL unnest(u.engines) AS e(engine) \
         WHERE u.verification_status <> 'pending' \
           AND u.trust_score IS NOT NULL \
           AND (u.first_seen_at AT TIME ZONE 'UTC')::date <= $1 \
         ORDER BY e.engine, u.id",
    )
    .bind(date)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Completed runs between `start` and `end` (inclusive UTC dates).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn engine_query_outcomes(
    pool: &PgPool,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<EngineQueryOutcomeRow>, DbError> {
    let rows = sqlx::query_as::<_, EngineQueryOutcomeRow>(
        "SELECT model AS engine, prompt_id, visibility_score, brand_mentioned, rank \
         FROM prompt_results \
         WHERE (created_at AT TIME ZONE 'UTC')::date BETWEEN $1 AND $2 \
         ORDER BY id",
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Derived rows
// ---------------------------------------------------------------------------

/// Insert or overwrite the snapshot for `(engine, snapshot_date)`.
/// `computed_at` only moves when a derived value changes, so a re-run over
/// unchanged history leaves the stored row untouched.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_trust_snapshot(
    pool: &PgPool,
    snapshot: &TrustSnapshot,
    computed_at: DateTime<Utc>,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO trust_snapshots \
             (engine, snapshot_date, reliability_score, citation_completeness, freshness_index, \
              authority_weight, query_volume, success_rate, computed_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (engine, snapshot_date) DO UPDATE SET \
             reliability_score = EXCLUDED.reliability_score, \
             citation_completeness = EXCLUDED.citation_completeness, \
             freshness_index = EXCLUDED.freshness_index, \
             authority_weight = EXCLUDED.authority_weight, \
             query_volume = EXCLUDED.query_volume, \
             success_rate = EXCLUDED.success_rate, \
             computed_at = EXCLUDED.computed_at \
         WHERE (trust_snapshots.reliability_score, trust_snapshots.citation_completeness, \
                trust_snapshots.freshness_index, trust_snapshots.authority_weight, \
                trust_snapshots.query_volume, trust_snapshots.success_rate) \
               IS DISTINCT FROM \
               (EXCLUDED.reliability_score, EXCLUDED.citation_completeness, \
                EXCLUDED.freshness_index, EXCLUDED.authority_weight, \
                EXCLUDED.query_volume, EXCLUDED.success_rate)",
    )
    .bind(&snapshot.engine)
    .bind(snapshot.snapshot_date)
    .bind(to_decimal(snapshot.reliability_score, RATIO_SCALE))
    .bind(to_decimal(snapshot.citation_completeness, RATIO_SCALE))
    .bind(to_decimal(snapshot.freshness_index, RATIO_SCALE))
    .bind(to_decimal(snapshot.authority_weight, RATIO_SCALE))
    .bind(snapshot.query_volume)
    .bind(to_decimal(snapshot.success_rate, RATIO_SCALE))
    .bind(computed_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Snapshots between `start` and `end` inclusive, optionally for one engine,
/// ordered by engine then date.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_trust_snapshots(
    pool: &PgPool,
    engine: Option<&str>,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<TrustSnapshot>, DbError> {
    let rows = sqlx::query_as::<_, TrustSnapshotRow>(
        "SELECT engine, snapshot_date, reliability_score, citation_completeness, \
                freshness_index, authority_weight, query_volume, success_rate \
         FROM trust_snapshots \
         WHERE ($1::text IS NULL OR engine = $1) \
           AND snapshot_date BETWEEN $2 AND $3 \
         ORDER BY engine, snapshot_date",
    )
    .bind(engine)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(TrustSnapshot::from).collect())
}

/// Engines that have at least one snapshot, sorted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_trust_engines(pool: &PgPool) -> Result<Vec<String>, DbError> {
    let engines =
        sqlx::query_scalar::<_, String>("SELECT DISTINCT engine FROM trust_snapshots ORDER BY 1")
            .fetch_all(pool)
            .await?;

    Ok(engines)
}

/// Insert or overwrite the trend for `(engine, window, as_of)`. Trends for
/// other dates are kept; `computed_at` only moves when a derived value
/// changes.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_trust_trend(
    pool: &PgPool,
    trend: &TrustTrend,
    computed_at: DateTime<Utc>,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO trust_trends \
             (engine, window_label, as_of, authority_delta, direction, reliability_delta, \
              volatility, outage_count, outage_minutes, current_authority, projected_authority, \
              computed_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
         ON CONFLICT (engine, window_label, as_of) DO UPDATE SET \
             authority_delta = EXCLUDED.authority_delta, \
             direction = EXCLUDED.direction, \
             reliability_delta = EXCLUDED.reliability_delta, \
             volatility = EXCLUDED.volatility, \
             outage_count = EXCLUDED.outage_count, \
             outage_minutes = EXCLUDED.outage_minutes, \
             current_authority = EXCLUDED.current_authority, \
             projected_authority = EXCLUDED.projected_authority, \
             computed_at = EXCLUDED.computed_at \
         WHERE (trust_trends.authority_delta, trust_trends.direction, \
                trust_trends.reliability_delta, trust_trends.volatility, \
                trust_trends.outage_count, trust_trends.outage_minutes, \
                trust_trends.current_authority, trust_trends.projected_authority) \
               IS DISTINCT FROM \
               (EXCLUDED.authority_delta, EXCLUDED.direction, EXCLUDED.reliability_delta, \
                EXCLUDED.volatility, EXCLUDED.outage_count, EXCLUDED.outage_minutes, \
                EXCLUDED.current_authority, EXCLUDED.projected_authority)",
    )
    .bind(&trend.engine)
    .bind(trend.window.as_str())
    .bind(trend.as_of)
    .bind(to_decimal(trend.authority_delta, RATIO_SCALE))
    .bind(trend.direction.as_str())
    .bind(to_decimal(trend.reliability_delta, RATIO_SCALE))
    .bind(to_decimal(trend.volatility, RATIO_SCALE))
    .bind(trend.outage_count)
    .bind(trend.outage_minutes)
    .bind(to_decimal(trend.current_authority, RATIO_SCALE))
    .bind(trend.projected_authority.map(|p| to_decimal(p, RATIO_SCALE)))
    .bind(computed_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Latest stored trend per engine and window, optionally filtered, ordered by
/// engine then window.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on query failure or [`DbError::InvalidValue`]
/// if a stored label is unknown.
pub async fn list_trust_trends(
    pool: &PgPool,
    engine: Option<&str>,
    window: Option<TrustWindow>,
) -> Result<Vec<TrustTrend>, DbError> {
    let rows = sqlx::query_as::<_, TrustTrendRow>(
        "SELECT DISTINCT ON (engine, window_label) \
                engine, window_label, as_of, authority_delta, direction, reliability_delta, \
                volatility, outage_count, outage_minutes, current_authority, projected_authority \
         FROM trust_trends \
         WHERE ($1::text IS NULL OR engine = $1) \
           AND ($2::text IS NULL OR window_label = $2) \
         ORDER BY engine, window_label, as_of DESC",
    )
    .bind(engine)
    .bind(window.map(TrustWindow::as_str))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(TrustTrend::try_from).collect()
}

/// Insert or overwrite the correlation for `(engine_a, engine_b, period)`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_engine_correlation(
    pool: &PgPool,
    correlation: &EngineCorrelation,
    computed_at: DateTime<Utc>,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO engine_correlations \
             (engine_a, engine_b, period_start, period_end, shared_queries, correlation, \
              disagreement_frequency, win_rate_a, win_rate_b, computed_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (engine_a, engine_b, period_start, period_end) DO UPDATE SET \
             shared_queries = EXCLUDED.shared_queries, \
             correlation = EXCLUDED.correlation, \
             disagreement_frequency = EXCLUDED.disagreement_frequency, \
             win_rate_a = EXCLUDED.win_rate_a, \
             win_rate_b = EXCLUDED.win_rate_b, \
             computed_at = EXCLUDED.computed_at \
         WHERE (engine_correlations.shared_queries, engine_correlations.correlation, \
                engine_correlations.disagreement_frequency, engine_correlations.win_rate_a, \
                engine_correlations.win_rate_b) \
               IS DISTINCT FROM \
               (EXCLUDED.shared_queries, EXCLUDED.correlation, EXCLUDED.disagreement_frequency, \
                EXCLUDED.win_rate_a, EXCLUDED.win_rate_b)",
    )
    .bind(&correlation.engine_a)
    .bind(&correlation.engine_b)
    .bind(correlation.period_start)
    .bind(correlation.period_end)
    .bind(correlation.shared_queries)
    .bind(correlation.correlation.map(|c| to_decimal(c, RATIO_SCALE)))
    .bind(to_decimal(correlation.disagreement_frequency, RATIO_SCALE))
    .bind(to_decimal(correlation.win_rate_a, RATIO_SCALE))
    .bind(to_decimal(correlation.win_rate_b, RATIO_SCALE))
    .bind(computed_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// The most recently computed correlation period, all pairs.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_engine_correlations(pool: &PgPool) -> Result<Vec<EngineCorrelation>, DbError> {
    let rows = sqlx::query_as::<_, EngineCorrelationRow>(
        "SELECT engine_a, engine_b, period_start, period_end, shared_queries, correlation, \
                disagreement_frequency, win_rate_a, win_rate_b \
         FROM engine_correlations \
         WHERE period_end = (SELECT MAX(period_end) FROM engine_correlations) \
         ORDER BY engine_a, engine_b, period_start",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(EngineCorrelation::from).collect())
}
