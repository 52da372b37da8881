//! Postgres-backed [`JobRecorder`].

use aivis_analysis::{AnalysisJob, JobRecorder, Judgement};
use aivis_core::{Citation, SerpSnapshot};
use aivis_db::{
    ChangeFeed, ChangeOp, CitationSighting, DbError, EntityKind, JobCompletion, JobState,
    NewPromptResult,
};
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

/// Writes job progress, results, history and ledger rows for one owner's
/// prompts, publishing each persisted change when a feed is attached.
pub struct PgJobRecorder<'a> {
    pool: &'a PgPool,
    feed: Option<&'a ChangeFeed>,
    owner_id: Option<Uuid>,
}

impl<'a> PgJobRecorder<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            feed: None,
            owner_id: None,
        }
    }

    #[must_use]
    pub fn with_feed(mut self, feed: Option<&'a ChangeFeed>, owner_id: Uuid) -> Self {
        self.feed = feed;
        self.owner_id = Some(owner_id);
        self
    }

    fn publish(&self, kind: EntityKind, key: String, payload: serde_json::Value) {
        if let Some(feed) = self.feed {
            feed.publish(self.owner_id, kind, key, ChangeOp::Upsert, payload);
        }
    }

    fn publish_job(&self, id: i64, job: &AnalysisJob) {
        if self.feed.is_some() {
            match serde_json::to_value(job) {
                Ok(payload) => self.publish(EntityKind::AnalysisJob, id.to_string(), payload),
                Err(e) => tracing::warn!(job_id = id, error = %e, "could not serialize job"),
            }
        }
    }
}

fn job_id(job: &AnalysisJob) -> Result<i64, DbError> {
    job.id.ok_or(DbError::InvalidValue {
        column: "analysis_jobs.id",
        reason: "job has not been created".to_string(),
    })
}

fn job_state(job: &AnalysisJob) -> JobState<'_> {
    JobState {
        phase: job.phase,
        brand_mentioned: job.phase.is_terminal().then_some(job.brand_mentioned),
        sentiment: job.sentiment,
        confidence: job.confidence,
        visibility_score: job.visibility_score,
        reasoning: job.reasoning.as_deref(),
        completed_at: job.completed_at,
    }
}

/// Text a cited page is expected to support: the citation's own snippet or
/// title, else the answer excerpt it was cited in.
fn claim_for<'c>(citation: &'c Citation, judgement: &'c Judgement) -> Option<&'c str> {
    citation
        .snippet
        .as_deref()
        .or(citation.title.as_deref())
        .or(Some(judgement.snippet.as_str()))
        .filter(|s| !s.trim().is_empty())
}

impl JobRecorder for PgJobRecorder<'_> {
    type Error = DbError;

    async fn create_job(&self, job: &AnalysisJob) -> Result<i64, DbError> {
        let row =
            aivis_db::insert_job(self.pool, job.prompt_id, &job.model, &job.persona, job.created_at)
                .await?;
        self.publish_job(row.id, job);
        Ok(row.id)
    }

    async fn record_phase(&self, job: &AnalysisJob) -> Result<(), DbError> {
        let id = job_id(job)?;
        aivis_db::update_job_state(self.pool, id, &job_state(job)).await?;
        self.publish_job(id, job);
        Ok(())
    }

    async fn record_serp(&self, job: &AnalysisJob, snapshot: &SerpSnapshot) -> Result<(), DbError> {
        aivis_db::insert_serp_history(self.pool, job.prompt_id, job.id, snapshot, Utc::now())
            .await?;
        Ok(())
    }

    async fn record_completion(
        &self,
        job: &AnalysisJob,
        judgement: &Judgement,
    ) -> Result<(), DbError> {
        let id = job_id(job)?;
        let completed_at = job.completed_at.unwrap_or_else(Utc::now);
        let sightings = sightings(id, judgement);

        let ids = aivis_db::record_job_completion(
            self.pool,
            &JobCompletion {
                job_id: id,
                state: job_state(job),
                result: NewPromptResult {
                    prompt_id: job.prompt_id,
                    job_id: Some(id),
                    model: &job.model,
                    persona: &job.persona,
                    brand_mentioned: judgement.brand_mentioned,
                    sentiment: judgement.sentiment,
                    rank: judgement.rank,
                    visibility_score: judgement.visibility_score,
                    response_snippet: Some(judgement.snippet.as_str()),
                    citations: &judgement.citations,
                    competitors: serde_json::to_value(&judgement.competitors)?,
                    recommendations: &judgement.recommendations,
                    created_at: completed_at,
                },
                citations: &sightings,
            },
        )
        .await?;

        for (sighting, citation_id) in sightings.iter().zip(&ids.citation_ids) {
            self.publish(
                EntityKind::UrlCitation,
                citation_id.to_string(),
                serde_json::json!({ "url": sighting.url, "domain": sighting.domain }),
            );
        }
        self.publish_job(id, job);
        self.publish(
            EntityKind::PromptResult,
            ids.result_id.to_string(),
            serde_json::json!({
                "prompt_id": job.prompt_id,
                "model": job.model,
                "persona": job.persona,
                "visibility_score": judgement.visibility_score,
                "brand_mentioned": judgement.brand_mentioned,
            }),
        );
        Ok(())
    }
}

/// Ledger sightings for every cited URL with a usable host.
fn sightings(job_id: i64, judgement: &Judgement) -> Vec<CitationSighting<'_>> {
    judgement
        .citations
        .iter()
        .filter_map(|citation| {
            let Some(domain) = aivis_trust::domain_of(&citation.url) else {
                tracing::warn!(
                    job_id,
                    url = %citation.url,
                    "cited URL has no usable host, not added to ledger"
                );
                return None;
            };
            Some(CitationSighting {
                url: citation.url.as_str(),
                domain,
                claim: claim_for(citation, judgement),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aivis_core::JobPhase;

    fn judgement(snippet: &str) -> Judgement {
        Judgement {
            brand_mentioned: true,
            mention_count: 1,
            rank: Some(1),
            sentiment: None,
            sentiment_score: 0.0,
            citations: Vec::new(),
            competitors: Vec::new(),
            visibility_score: 70.0,
            confidence: 0.5,
            recommendations: Vec::new(),
            reasoning: String::new(),
            snippet: snippet.to_string(),
        }
    }

    fn citation(title: Option<&str>, snippet: Option<&str>) -> Citation {
        Citation {
            title: title.map(str::to_string),
            url: "https://acme.com".to_string(),
            snippet: snippet.map(str::to_string),
            position: 1,
        }
    }

    #[test]
    fn claim_prefers_snippet_then_title_then_answer() {
        let j = judgement("Acme leads the market");
        let c = citation(Some("Acme pricing"), Some("Acme costs $10"));
        assert_eq!(claim_for(&c, &j), Some("Acme costs $10"));
        let c = citation(Some("Acme pricing"), None);
        assert_eq!(claim_for(&c, &j), Some("Acme pricing"));
        let c = citation(None, None);
        assert_eq!(claim_for(&c, &j), Some("Acme leads the market"));
    }

    #[test]
    fn blank_claim_is_none() {
        let j = judgement("   ");
        assert_eq!(claim_for(&citation(None, None), &j), None);
    }

    #[test]
    fn sightings_skip_urls_without_host() {
        let mut j = judgement("Acme leads the market");
        j.citations = vec![
            citation(None, Some("Acme costs $10")),
            Citation {
                url: "   ".to_string(),
                ..citation(None, None)
            },
        ];
        let found = sightings(7, &j);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].domain, "acme.com");
        assert_eq!(found[0].claim, Some("Acme costs $10"));
    }

    #[test]
    fn uncreated_job_has_no_id() {
        let job = AnalysisJob::new(1, "gpt-4o", "default");
        assert!(matches!(job_id(&job), Err(DbError::InvalidValue { .. })));
    }

    #[test]
    fn non_terminal_state_leaves_mention_unset() {
        let mut job = AnalysisJob::new(1, "gpt-4o", "default");
        job.advance(JobPhase::Scraping).unwrap();
        let state = job_state(&job);
        assert_eq!(state.phase, JobPhase::Scraping);
        assert_eq!(state.brand_mentioned, None);
        assert!(state.completed_at.is_none());
    }
}
