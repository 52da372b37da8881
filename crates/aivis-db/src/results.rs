//! Database operations for the `prompt_results` table. Rows are immutable
//! once written.

use aivis_core::{Citation, Sentiment};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};

use crate::decimal::to_decimal;
use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `prompt_results` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PromptResultRow {
    pub id: i64,
    pub prompt_id: i64,
    pub job_id: Option<i64>,
    pub model: String,
    pub persona: String,
    pub brand_mentioned: bool,
    pub sentiment: Option<String>,
    pub rank: Option<i32>,
    pub visibility_score: Decimal,
    pub response_snippet: Option<String>,
    pub citations: Json<Vec<Citation>>,
    /// Competitor standings as produced by the judge.
    pub competitors: Value,
    pub recommendations: Json<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPromptResult<'a> {
    pub prompt_id: i64,
    pub job_id: Option<i64>,
    pub model: &'a str,
    pub persona: &'a str,
    pub brand_mentioned: bool,
    pub sentiment: Option<Sentiment>,
    pub rank: Option<u32>,
    pub visibility_score: f64,
    pub response_snippet: Option<&'a str>,
    pub citations: &'a [Citation],
    pub competitors: Value,
    pub recommendations: &'a [String],
    pub created_at: DateTime<Utc>,
}

const RESULT_COLUMNS: &str = "id, prompt_id, job_id, model, persona, brand_mentioned, sentiment, \
                              rank, visibility_score, response_snippet, citations, competitors, \
                              recommendations, created_at";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Insert a judged result and return its generated id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_prompt_result<'e, E>(
    executor: E,
    result: &NewPromptResult<'_>,
) -> Result<i64, DbError>
where
    E: PgExecutor<'e>,
{
    let rank = result.rank.and_then(|r| i32::try_from(r).ok());
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO prompt_results \
             (prompt_id, job_id, model, persona, brand_mentioned, sentiment, rank, \
              visibility_score, response_snippet, citations, competitors, recommendations, \
              created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
         RETURNING id",
    )
    .bind(result.prompt_id)
    .bind(result.job_id)
    .bind(result.model)
    .bind(result.persona)
    .bind(result.brand_mentioned)
    .bind(result.sentiment.map(Sentiment::as_str))
    .bind(rank)
    .bind(to_decimal(result.visibility_score, 2))
    .bind(result.response_snippet)
    .bind(Json(result.citations))
    .bind(&result.competitors)
    .bind(Json(result.recommendations))
    .bind(result.created_at)
    .fetch_one(executor)
    .await?;

    Ok(id)
}

/// Most recent results for a prompt, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_results_for_prompt(
    pool: &PgPool,
    prompt_id: i64,
    limit: i64,
) -> Result<Vec<PromptResultRow>, DbError> {
    let rows = sqlx::query_as::<_, PromptResultRow>(&format!(
        "SELECT {RESULT_COLUMNS} FROM prompt_results \
         WHERE prompt_id = $1 \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2"
    ))
    .bind(prompt_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
