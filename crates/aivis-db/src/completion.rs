//! The write set of a completed analysis job, applied in one transaction.

use sqlx::PgPool;

use crate::citations::record_citation;
use crate::decimal::to_decimal;
use crate::history::insert_visibility_history;
use crate::jobs::{update_job_state, JobState};
use crate::prompts::update_prompt_score;
use crate::results::{insert_prompt_result, NewPromptResult};
use crate::DbError;

/// One URL cited by the completed answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationSighting<'a> {
    pub url: &'a str,
    pub domain: String,
    pub claim: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct JobCompletion<'a> {
    pub job_id: i64,
    /// Terminal state written to the job row.
    pub state: JobState<'a>,
    pub result: NewPromptResult<'a>,
    pub citations: &'a [CitationSighting<'a>],
}

/// Ids generated while recording a completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionIds {
    pub result_id: i64,
    /// Ledger row ids, in the order of [`JobCompletion::citations`].
    pub citation_ids: Vec<i64>,
}

/// Write the result row, visibility point, prompt score, ledger sightings and
/// the job's terminal state together. Nothing is kept if any write fails, so
/// the job stays in its last recorded phase.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the prompt or job row is missing, or
/// [`DbError::Sqlx`] if any write or the commit fails.
pub async fn record_job_completion(
    pool: &PgPool,
    completion: &JobCompletion<'_>,
) -> Result<CompletionIds, DbError> {
    let result = &completion.result;
    let mut tx = pool.begin().await?;

    let result_id = insert_prompt_result(&mut *tx, result).await?;
    insert_visibility_history(
        &mut *tx,
        result.prompt_id,
        result.model,
        result.visibility_score,
        result.brand_mentioned,
        result.rank,
        result.created_at,
    )
    .await?;
    update_prompt_score(
        &mut *tx,
        result.prompt_id,
        to_decimal(result.visibility_score, 2),
    )
    .await?;

    let mut citation_ids = Vec::with_capacity(completion.citations.len());
    for sighting in completion.citations {
        let id = record_citation(
            &mut *tx,
            sighting.url,
            &sighting.domain,
            result.model,
            result.prompt_id,
            sighting.claim,
            result.created_at,
        )
        .await?;
        citation_ids.push(id);
    }

    update_job_state(&mut *tx, completion.job_id, &completion.state).await?;
    tx.commit().await?;

    Ok(CompletionIds {
        result_id,
        citation_ids,
    })
}
