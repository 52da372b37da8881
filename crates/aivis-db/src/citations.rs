//! Database operations for the `url_citations` ledger.

use aivis_core::{HallucinationRisk, VerificationStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgExecutor, PgPool};

use crate::decimal::to_decimal;
use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `url_citations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UrlCitationRow {
    pub id: i64,
    pub url: String,
    pub domain: String,
    pub citation_count: i64,
    pub engines: Vec<String>,
    pub prompt_ids: Vec<i64>,
    /// Latest answer sentence that cited the URL; verified against the page.
    pub claim: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub verification_status: String,
    pub trust_score: Option<Decimal>,
    pub hallucination_risk: Option<String>,
    pub content_hash: Option<String>,
    pub verification_error: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
}

impl UrlCitationRow {
    /// Parsed verification status.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidValue`] if the stored status is unknown.
    pub fn status(&self) -> Result<VerificationStatus, DbError> {
        self.verification_status
            .parse()
            .map_err(|e: aivis_core::CoreError| DbError::InvalidValue {
                column: "url_citations.verification_status",
                reason: e.to_string(),
            })
    }
}

/// Outcome of verifying one ledger URL.
#[derive(Debug, Clone)]
pub struct VerificationUpdate<'a> {
    pub status: VerificationStatus,
    pub trust_score: f64,
    pub risk: HallucinationRisk,
    pub content_hash: Option<&'a str>,
    pub error: Option<&'a str>,
}

const CITATION_COLUMNS: &str = "id, url, domain, citation_count, engines, prompt_ids, claim, \
                                first_seen_at, last_seen_at, verification_status, trust_score, \
                                hallucination_risk, content_hash, verification_error, verified_at";

const CLAIM_CHANGED: &str =
    "(EXCLUDED.claim IS NOT NULL AND EXCLUDED.claim IS DISTINCT FROM url_citations.claim)";

fn risk_label(risk: HallucinationRisk) -> &'static str {
    match risk {
        HallucinationRisk::Low => "low",
        HallucinationRisk::Medium => "medium",
        HallucinationRisk::High => "high",
        HallucinationRisk::VeryHigh => "very_high",
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Record one citation of `url` by `engine` for `prompt_id`.
///
/// New URLs enter the ledger as `pending`. Existing rows get their count
/// incremented and the engine and prompt merged into their sets. A sighting
/// with a different claim replaces the stored one and sends the row back to
/// `pending` with its score and risk cleared; otherwise the verification
/// state is left alone.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn record_citation<'e, E>(
    executor: E,
    url: &str,
    domain: &str,
    engine: &str,
    prompt_id: i64,
    claim: Option<&str>,
    seen_at: DateTime<Utc>,
) -> Result<i64, DbError>
where
    E: PgExecutor<'e>,
{
    let id: i64 = sqlx::query_scalar(&format!(
        "INSERT INTO url_citations \
             (url, domain, citation_count, engines, prompt_ids, claim, first_seen_at, last_seen_at) \
         VALUES ($1, $2, 1, ARRAY[$3::text], ARRAY[$4::bigint], $5, $6, $6) \
         ON CONFLICT (url) DO UPDATE SET \
             citation_count = url_citations.citation_count + 1, \
             engines = CASE WHEN $3 = ANY(url_citations.engines) THEN url_citations.engines \
                            ELSE array_append(url_citations.engines, $3) END, \
             prompt_ids = CASE WHEN $4 = ANY(url_citations.prompt_ids) \
                               THEN url_citations.prompt_ids \
                               ELSE array_append(url_citations.prompt_ids, $4) END, \
             claim = COALESCE(EXCLUDED.claim, url_citations.claim), \
             last_seen_at = GREATEST(url_citations.last_seen_at, EXCLUDED.last_seen_at), \
             verification_status = CASE WHEN {CLAIM_CHANGED} THEN 'pending' \
                                        ELSE url_citations.verification_status END, \
             trust_score = CASE WHEN {CLAIM_CHANGED} THEN NULL \
                                ELSE url_citations.trust_score END, \
             hallucination_risk = CASE WHEN {CLAIM_CHANGED} THEN NULL \
                                       ELSE url_citations.hallucination_risk END, \
             verification_error = CASE WHEN {CLAIM_CHANGED} THEN NULL \
                                       ELSE url_citations.verification_error END \
         RETURNING id"
    ))
    .bind(url)
    .bind(domain)
    .bind(engine)
    .bind(prompt_id)
    .bind(claim)
    .bind(seen_at)
    .fetch_one(executor)
    .await?;

    Ok(id)
}

/// Pending ledger rows, most recently seen first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_pending_citations(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<UrlCitationRow>, DbError> {
    let rows = sqlx::query_as::<_, UrlCitationRow>(&format!(
        "SELECT {CITATION_COLUMNS} FROM url_citations \
         WHERE verification_status = 'pending' \
         ORDER BY last_seen_at DESC, id \
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Ledger rows that have a claim to check, least recently verified first.
/// Rows never verified come first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_citations_for_reverification(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<UrlCitationRow>, DbError> {
    let rows = sqlx::query_as::<_, UrlCitationRow>(&format!(
        "SELECT {CITATION_COLUMNS} FROM url_citations \
         WHERE claim IS NOT NULL \
         ORDER BY verified_at ASC NULLS FIRST, id \
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns the ledger row with `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if missing, [`DbError::Sqlx`] on query failure.
pub async fn get_citation(pool: &PgPool, id: i64) -> Result<UrlCitationRow, DbError> {
    sqlx::query_as::<_, UrlCitationRow>(&format!(
        "SELECT {CITATION_COLUMNS} FROM url_citations WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// The full ledger, optionally restricted to URLs cited by `engine`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_citation_ledger(
    pool: &PgPool,
    engine: Option<&str>,
) -> Result<Vec<UrlCitationRow>, DbError> {
    let rows = sqlx::query_as::<_, UrlCitationRow>(&format!(
        "SELECT {CITATION_COLUMNS} FROM url_citations \
         WHERE $1::text IS NULL OR $1 = ANY(engines) \
         ORDER BY id"
    ))
    .bind(engine)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns the ledger row for `url`, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_citation_by_url(
    pool: &PgPool,
    url: &str,
) -> Result<Option<UrlCitationRow>, DbError> {
    let row = sqlx::query_as::<_, UrlCitationRow>(&format!(
        "SELECT {CITATION_COLUMNS} FROM url_citations WHERE url = $1"
    ))
    .bind(url)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Overwrite the verification state of ledger row `id`. Re-verifying with
/// the same outcome leaves the row unchanged apart from `verified_at`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row has `id`, or [`DbError::Sqlx`] if
/// the update fails.
pub async fn record_verification(
    pool: &PgPool,
    id: i64,
    update: &VerificationUpdate<'_>,
) -> Result<(), DbError> {
    let trust = update
        .status
        .has_trust_score()
        .then(|| to_decimal(update.trust_score, 4));
    let result = sqlx::query(
        "UPDATE url_citations \
         SET verification_status = $1, trust_score = $2, hallucination_risk = $3, \
             content_hash = $4, verification_error = $5, verified_at = NOW() \
         WHERE id = $6",
    )
    .bind(update.status.as_str())
    .bind(trust)
    .bind(risk_label(update.risk))
    .bind(update.content_hash)
    .bind(update.error)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_labels_match_schema() {
        assert_eq!(risk_label(HallucinationRisk::VeryHigh), "very_high");
        assert_eq!(risk_label(HallucinationRisk::Low), "low");
    }
}
