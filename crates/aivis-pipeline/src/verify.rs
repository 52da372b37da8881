//! Verification of ledger citations against the claims they were cited for.

use aivis_db::{ChangeFeed, ChangeOp, DbError, EntityKind, UrlCitationRow, VerificationUpdate};
use aivis_trust::{CitationVerifier, PageFetcher, SimilarityScorer, Verification};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use sqlx::PgPool;

use crate::error::PipelineError;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct VerifySummary {
    pub checked: usize,
    pub verified: usize,
    pub unverified: usize,
    pub hallucinated: usize,
    /// Rows with no claim to check against; they stay pending.
    pub skipped: usize,
    pub errors: usize,
}

impl VerifySummary {
    fn count(&mut self, verification: &Verification) {
        use aivis_core::VerificationStatus as S;
        self.checked += 1;
        match verification.status {
            S::Verified => self.verified += 1,
            S::Unverified => self.unverified += 1,
            S::Hallucinated => self.hallucinated += 1,
            S::Pending => {}
        }
    }
}

/// Which ledger rows a verification batch covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CitationSelection {
    /// Rows never checked, or sent back by a sighting with a new claim.
    #[default]
    Pending,
    /// Every row with a claim, least recently verified first.
    All,
}

enum RowOutcome {
    Checked(Verification),
    Skipped,
}

/// Verify up to `limit` selected ledger rows, `max_concurrent` at a time,
/// and store each outcome. A row that fails to verify or save is logged and
/// keeps its previous state; the batch continues.
///
/// # Errors
///
/// Returns [`PipelineError::Db`] only if the rows cannot be listed.
pub async fn verify_citations<F, S>(
    pool: &PgPool,
    verifier: &CitationVerifier<F, S>,
    selection: CitationSelection,
    limit: i64,
    max_concurrent: usize,
    feed: Option<&ChangeFeed>,
) -> Result<VerifySummary, PipelineError>
where
    F: PageFetcher,
    S: SimilarityScorer,
{
    let pending = match selection {
        CitationSelection::Pending => aivis_db::list_pending_citations(pool, limit).await?,
        CitationSelection::All => {
            aivis_db::list_citations_for_reverification(pool, limit).await?
        }
    };
    if pending.is_empty() {
        tracing::debug!(?selection, "no citations to verify");
        return Ok(VerifySummary::default());
    }

    let results: Vec<(UrlCitationRow, Result<RowOutcome, PipelineError>)> =
        stream::iter(pending)
            .map(|row| async move {
                let result = verify_row(pool, verifier, &row, feed).await;
                (row, result)
            })
            .buffer_unordered(max_concurrent.max(1))
            .collect()
            .await;

    let mut summary = VerifySummary::default();
    for (row, result) in &results {
        match result {
            Ok(RowOutcome::Checked(verification)) => summary.count(verification),
            Ok(RowOutcome::Skipped) => summary.skipped += 1,
            Err(e) => {
                tracing::error!(
                    citation_id = row.id,
                    url = %row.url,
                    error = %e,
                    "verification failed"
                );
                summary.errors += 1;
            }
        }
    }

    tracing::info!(
        ?selection,
        checked = summary.checked,
        verified = summary.verified,
        hallucinated = summary.hallucinated,
        skipped = summary.skipped,
        errors = summary.errors,
        "citation verification complete"
    );
    Ok(summary)
}

/// Re-verify one ledger row against its stored claim and store the outcome.
///
/// # Errors
///
/// - [`PipelineError::CitationNotFound`] if no row has `id`.
/// - [`PipelineError::MissingClaim`] if the row has no claim to check.
/// - [`PipelineError::Db`] if the row cannot be read or the outcome saved.
pub async fn reverify_citation<F, S>(
    pool: &PgPool,
    verifier: &CitationVerifier<F, S>,
    id: i64,
    feed: Option<&ChangeFeed>,
) -> Result<Verification, PipelineError>
where
    F: PageFetcher,
    S: SimilarityScorer,
{
    let row = match aivis_db::get_citation(pool, id).await {
        Ok(row) => row,
        Err(DbError::NotFound) => return Err(PipelineError::CitationNotFound(id)),
        Err(e) => return Err(e.into()),
    };
    match verify_row(pool, verifier, &row, feed).await? {
        RowOutcome::Checked(verification) => Ok(verification),
        RowOutcome::Skipped => Err(PipelineError::MissingClaim(id)),
    }
}

async fn verify_row<F, S>(
    pool: &PgPool,
    verifier: &CitationVerifier<F, S>,
    row: &UrlCitationRow,
    feed: Option<&ChangeFeed>,
) -> Result<RowOutcome, PipelineError>
where
    F: PageFetcher,
    S: SimilarityScorer,
{
    let Some(claim) = row.claim.as_deref().filter(|c| !c.trim().is_empty()) else {
        tracing::warn!(citation_id = row.id, url = %row.url, "citation has no claim, skipping");
        return Ok(RowOutcome::Skipped);
    };

    let verification = verifier.verify(&row.url, claim, None).await;
    aivis_db::record_verification(
        pool,
        row.id,
        &VerificationUpdate {
            status: verification.status,
            trust_score: verification.trust_score,
            risk: verification.risk,
            content_hash: verification.content_hash.as_deref(),
            error: verification.failure.as_deref(),
        },
    )
    .await?;
    tracing::debug!(
        citation_id = row.id,
        status = %verification.status.as_str(),
        content_changed = row.content_hash.is_some()
            && row.content_hash != verification.content_hash,
        "citation verified"
    );

    if let Some(feed) = feed {
        feed.publish(
            None,
            EntityKind::UrlCitation,
            row.id.to_string(),
            ChangeOp::Upsert,
            serde_json::json!({
                "url": row.url,
                "domain": row.domain,
                "verification_status": verification.status,
                "trust_score": verification.trust_score,
                "hallucination_risk": verification.risk,
            }),
        );
    }
    Ok(RowOutcome::Checked(verification))
}
