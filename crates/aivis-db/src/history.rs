//! Append-only series: `visibility_history` and `serp_history`.

use aivis_core::SerpSnapshot;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{PgExecutor, PgPool};

use crate::decimal::to_decimal;
use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VisibilityHistoryRow {
    pub id: i64,
    pub prompt_id: i64,
    pub model: String,
    pub visibility_score: Decimal,
    pub brand_mentioned: bool,
    pub rank: Option<i32>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SerpHistoryRow {
    pub id: i64,
    pub prompt_id: i64,
    pub job_id: Option<i64>,
    pub brand_in_results: bool,
    pub position: Option<i32>,
    pub ai_overview: Option<String>,
    pub snapshot: Value,
    pub captured_at: DateTime<Utc>,
}

/// One visibility point tagged with its prompt's category.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CategoryVisibilityRow {
    pub category: String,
    pub recorded_on: NaiveDate,
    pub visibility_score: Decimal,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Append a visibility point for a completed run.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_visibility_history<'e, E>(
    executor: E,
    prompt_id: i64,
    model: &str,
    visibility_score: f64,
    brand_mentioned: bool,
    rank: Option<u32>,
    recorded_at: DateTime<Utc>,
) -> Result<i64, DbError>
where
    E: PgExecutor<'e>,
{
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO visibility_history \
             (prompt_id, model, visibility_score, brand_mentioned, rank, recorded_at) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING id",
    )
    .bind(prompt_id)
    .bind(model)
    .bind(to_decimal(visibility_score, 2))
    .bind(brand_mentioned)
    .bind(rank.and_then(|r| i32::try_from(r).ok()))
    .bind(recorded_at)
    .fetch_one(executor)
    .await?;

    Ok(id)
}

/// Visibility history for a prompt, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_visibility_history(
    pool: &PgPool,
    prompt_id: i64,
    limit: i64,
) -> Result<Vec<VisibilityHistoryRow>, DbError> {
    let rows = sqlx::query_as::<_, VisibilityHistoryRow>(
        "SELECT id, prompt_id, model, visibility_score, brand_mentioned, rank, recorded_at \
         FROM visibility_history \
         WHERE prompt_id = $1 \
         ORDER BY recorded_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(prompt_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Visibility points for categorized prompts recorded on or after `since`
/// (UTC dates).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_category_visibility(
    pool: &PgPool,
    since: NaiveDate,
) -> Result<Vec<CategoryVisibilityRow>, DbError> {
    let rows = sqlx::query_as::<_, CategoryVisibilityRow>(
        "SELECT p.category AS category, \
                (h.recorded_at AT TIME ZONE 'UTC')::date AS recorded_on, \
                h.visibility_score \
         FROM visibility_history h \
         JOIN prompts p ON p.id = h.prompt_id \
         WHERE p.category IS NOT NULL \
           AND (h.recorded_at AT TIME ZONE 'UTC')::date >= $1 \
         ORDER BY h.recorded_at, h.id",
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Append the SERP snapshot gathered for a job.
///
/// # Errors
///
/// Returns [`DbError::Json`] if the snapshot cannot be serialized, or
/// [`DbError::Sqlx`] if the insert fails.
pub async fn insert_serp_history(
    pool: &PgPool,
    prompt_id: i64,
    job_id: Option<i64>,
    snapshot: &SerpSnapshot,
    captured_at: DateTime<Utc>,
) -> Result<i64, DbError> {
    let payload = serde_json::to_value(snapshot)?;
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO serp_history \
             (prompt_id, job_id, brand_in_results, position, ai_overview, snapshot, captured_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING id",
    )
    .bind(prompt_id)
    .bind(job_id)
    .bind(snapshot.brand_in_results)
    .bind(snapshot.position.and_then(|p| i32::try_from(p).ok()))
    .bind(snapshot.ai_overview.as_deref())
    .bind(payload)
    .bind(captured_at)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// SERP history for a prompt, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_serp_history(
    pool: &PgPool,
    prompt_id: i64,
    limit: i64,
) -> Result<Vec<SerpHistoryRow>, DbError> {
    let rows = sqlx::query_as::<_, SerpHistoryRow>(
        "SELECT id, prompt_id, job_id, brand_in_results, position, ai_overview, snapshot, \
                captured_at \
         FROM serp_history \
         WHERE prompt_id = $1 \
         ORDER BY captured_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(prompt_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
