//! Database operations for the `prompts` table.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::brands::CompetitorEntry;
use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `prompts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PromptRow {
    pub id: i64,
    pub public_id: Uuid,
    pub brand_id: i64,
    pub text: String,
    pub location: Option<String>,
    pub country: Option<String>,
    pub category: Option<String>,
    /// Rolling snapshot of the latest completed job; history lives in
    /// `visibility_history`.
    pub visibility_score: Option<Decimal>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A prompt joined with the brand it tracks: everything an analysis run needs.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PromptTarget {
    pub prompt_id: i64,
    pub prompt_text: String,
    pub category: Option<String>,
    pub visibility_score: Option<Decimal>,
    pub brand_id: i64,
    pub owner_id: Uuid,
    pub brand_name: String,
    pub brand_domain: Option<String>,
    pub competitors: Json<Vec<CompetitorEntry>>,
}

#[derive(Debug, Clone, Default)]
pub struct NewPrompt<'a> {
    pub text: &'a str,
    pub location: Option<&'a str>,
    pub country: Option<&'a str>,
    pub category: Option<&'a str>,
}

const PROMPT_COLUMNS: &str = "id, public_id, brand_id, text, location, country, category, \
                              visibility_score, is_active, created_at, updated_at";

const TARGET_SELECT: &str = "SELECT p.id AS prompt_id, p.text AS prompt_text, p.category, \
                                    p.visibility_score, b.id AS brand_id, b.owner_id, \
                                    b.name AS brand_name, b.domain AS brand_domain, b.competitors \
                             FROM prompts p \
                             JOIN brands b ON b.id = p.brand_id";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Insert a prompt for `brand_id` and return the stored row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including an unknown brand).
pub async fn create_prompt(
    pool: &PgPool,
    brand_id: i64,
    prompt: &NewPrompt<'_>,
) -> Result<PromptRow, DbError> {
    let row = sqlx::query_as::<_, PromptRow>(&format!(
        "INSERT INTO prompts (public_id, brand_id, text, location, country, category) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING {PROMPT_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(brand_id)
    .bind(prompt.text)
    .bind(prompt.location)
    .bind(prompt.country)
    .bind(prompt.category)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Returns a prompt by id, or `None` if not found.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_prompt(pool: &PgPool, id: i64) -> Result<Option<PromptRow>, DbError> {
    let row = sqlx::query_as::<_, PromptRow>(&format!(
        "SELECT {PROMPT_COLUMNS} FROM prompts WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns the analysis target for one prompt, active or not.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_prompt_target(pool: &PgPool, id: i64) -> Result<Option<PromptTarget>, DbError> {
    let row = sqlx::query_as::<_, PromptTarget>(&format!("{TARGET_SELECT} WHERE p.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Returns every active prompt with its brand, ordered by prompt id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_prompt_targets(pool: &PgPool) -> Result<Vec<PromptTarget>, DbError> {
    let rows = sqlx::query_as::<_, PromptTarget>(&format!(
        "{TARGET_SELECT} WHERE p.is_active = true ORDER BY p.id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Overwrite the prompt's current visibility score. Concurrent jobs on the
/// same prompt race here; the last completion wins.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no prompt has `id`, or [`DbError::Sqlx`]
/// if the update fails.
pub async fn update_prompt_score<'e, E>(
    executor: E,
    id: i64,
    score: Decimal,
) -> Result<(), DbError>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE prompts SET visibility_score = $1, updated_at = NOW() WHERE id = $2",
    )
    .bind(score)
    .bind(id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Delete a prompt. Jobs, results, and history rows cascade with it.
///
/// Returns `true` if a row was deleted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_prompt(pool: &PgPool, id: i64) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM prompts WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
