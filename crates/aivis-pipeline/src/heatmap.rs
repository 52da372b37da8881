//! Heatmap over the stored citation ledger.

use aivis_db::{DbError, UrlCitationRow};
use aivis_trust::{build_heatmap, domains_for_engine, top_domains, DomainHeat, LedgerEntry};
use sqlx::PgPool;

use crate::error::PipelineError;

/// # Errors
///
/// Returns [`DbError::InvalidValue`] if a stored status is unknown.
pub fn ledger_entry(row: &UrlCitationRow) -> Result<LedgerEntry, DbError> {
    Ok(LedgerEntry {
        url: row.url.clone(),
        domain: row.domain.clone(),
        citation_count: row.citation_count,
        engines: row.engines.clone(),
        status: row.status()?,
        trust_score: row.trust_score.map(aivis_db::from_decimal),
    })
}

/// Domain heatmap of the ledger, optionally restricted to one engine's URLs
/// and truncated to the `top` hottest domains.
///
/// # Errors
///
/// Returns [`PipelineError::Db`] if the ledger cannot be read.
pub async fn load_heatmap(
    pool: &PgPool,
    engine: Option<&str>,
    top: Option<usize>,
) -> Result<Vec<DomainHeat>, PipelineError> {
    let rows = aivis_db::list_citation_ledger(pool, engine).await?;
    let entries = rows
        .iter()
        .map(ledger_entry)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(match (engine, top) {
        (Some(engine), Some(n)) => {
            let mut heat = domains_for_engine(&entries, engine);
            heat.truncate(n);
            heat
        }
        (Some(engine), None) => domains_for_engine(&entries, engine),
        (None, Some(n)) => top_domains(&entries, n),
        (None, None) => build_heatmap(&entries),
    })
}
