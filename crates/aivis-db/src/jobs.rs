//! Database operations for the `analysis_jobs` table.
//!
//! A job row is only ever mutated by the job that owns it, one phase at a
//! time. The table's CHECK constraint rejects a `completed_at` that disagrees
//! with the phase.

use aivis_core::{JobPhase, Sentiment};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::decimal::to_decimal;
use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `analysis_jobs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobRow {
    pub id: i64,
    pub public_id: Uuid,
    pub prompt_id: i64,
    pub model: String,
    pub persona: String,
    pub phase: String,
    pub brand_mentioned: Option<bool>,
    pub sentiment: Option<String>,
    pub confidence: Option<Decimal>,
    pub visibility_score: Option<Decimal>,
    pub reasoning: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRow {
    /// Parsed phase.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidValue`] if the stored phase is unknown.
    pub fn phase(&self) -> Result<JobPhase, DbError> {
        self.phase.parse().map_err(|e: aivis_core::CoreError| DbError::InvalidValue {
            column: "analysis_jobs.phase",
            reason: e.to_string(),
        })
    }
}

/// Mutable state written on every phase transition.
#[derive(Debug, Clone, PartialEq)]
pub struct JobState<'a> {
    pub phase: JobPhase,
    pub brand_mentioned: Option<bool>,
    pub sentiment: Option<Sentiment>,
    pub confidence: Option<f64>,
    pub visibility_score: Option<f64>,
    pub reasoning: Option<&'a str>,
    pub completed_at: Option<DateTime<Utc>>,
}

const JOB_COLUMNS: &str = "id, public_id, prompt_id, model, persona, phase, brand_mentioned, \
                           sentiment, confidence, visibility_score, reasoning, created_at, \
                           completed_at";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Insert a new job in the `pending` phase and return its row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_job(
    pool: &PgPool,
    prompt_id: i64,
    model: &str,
    persona: &str,
    created_at: DateTime<Utc>,
) -> Result<JobRow, DbError> {
    let row = sqlx::query_as::<_, JobRow>(&format!(
        "INSERT INTO analysis_jobs (public_id, prompt_id, model, persona, phase, created_at) \
         VALUES ($1, $2, $3, $4, 'pending', $5) \
         RETURNING {JOB_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(prompt_id)
    .bind(model)
    .bind(persona)
    .bind(created_at)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Overwrite the job's phase and result fields.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no job has `id`, or [`DbError::Sqlx`] if
/// the update fails (including the terminal/`completed_at` constraint).
pub async fn update_job_state<'e, E>(
    executor: E,
    id: i64,
    state: &JobState<'_>,
) -> Result<(), DbError>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE analysis_jobs \
         SET phase = $1, brand_mentioned = $2, sentiment = $3, confidence = $4, \
             visibility_score = $5, reasoning = $6, completed_at = $7 \
         WHERE id = $8",
    )
    .bind(state.phase.as_str())
    .bind(state.brand_mentioned)
    .bind(state.sentiment.map(Sentiment::as_str))
    .bind(state.confidence.map(|c| to_decimal(c, 4)))
    .bind(state.visibility_score.map(|s| to_decimal(s, 2)))
    .bind(state.reasoning)
    .bind(state.completed_at)
    .bind(id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Returns a job by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if missing, [`DbError::Sqlx`] on query failure.
pub async fn get_job(pool: &PgPool, id: i64) -> Result<JobRow, DbError> {
    sqlx::query_as::<_, JobRow>(&format!(
        "SELECT {JOB_COLUMNS} FROM analysis_jobs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Most recent jobs for a prompt, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_jobs_for_prompt(
    pool: &PgPool,
    prompt_id: i64,
    limit: i64,
) -> Result<Vec<JobRow>, DbError> {
    let rows = sqlx::query_as::<_, JobRow>(&format!(
        "SELECT {JOB_COLUMNS} FROM analysis_jobs \
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
