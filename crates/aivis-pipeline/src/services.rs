//! Production collaborators built from configuration.

use aivis_analysis::{
    EngineSettings, JobEngine, OpenAiAnswerClient, SerpApiClient, WebhookNotifier,
};
use aivis_core::{AppConfig, TrackingPolicy};
use aivis_db::ChangeFeed;
use aivis_trust::{CitationVerifier, HttpPageFetcher, LexicalOverlap, Verification};
use chrono::NaiveDate;
use sqlx::PgPool;

use crate::analysis::Analyzer;
use crate::error::PipelineError;
use crate::trust::{recompute_trust, TrustRecomputeSummary};
use crate::verify::{reverify_citation, verify_citations, CitationSelection, VerifySummary};

pub type Engine = JobEngine<OpenAiAnswerClient, Option<SerpApiClient>>;
pub type Verifier = CitationVerifier<HttpPageFetcher, LexicalOverlap>;

/// Everything the entry points need besides the pool, built once per process.
pub struct Services {
    pub policy: TrackingPolicy,
    pub engine: Engine,
    pub notifier: Option<WebhookNotifier>,
    pub verifier: Verifier,
    pub feed: ChangeFeed,
    pub max_concurrent: usize,
}

impl Services {
    /// # Errors
    ///
    /// Returns [`PipelineError`] if an HTTP client cannot be built or a
    /// configured URL is invalid.
    pub fn from_config(config: &AppConfig, policy: TrackingPolicy) -> Result<Self, PipelineError> {
        let answerer = OpenAiAnswerClient::with_base_url(
            config.answer_api_key.as_deref(),
            config.upstream_timeout_secs,
            &config.user_agent,
            &config.answer_api_url,
        )?;
        let serp = match config.serp_api_url.as_deref() {
            Some(url) => Some(SerpApiClient::with_base_url(
                config.serp_api_key.as_deref(),
                config.upstream_timeout_secs,
                &config.user_agent,
                url,
            )?),
            None => {
                tracing::info!("AIVIS_SERP_API_URL not set; SERP gathering disabled");
                None
            }
        };
        let engine = JobEngine::new(answerer, serp, EngineSettings::from_config(config, &policy));

        let notifier = config
            .webhook_url
            .as_deref()
            .map(|url| {
                WebhookNotifier::new(url, config.upstream_timeout_secs, &config.user_agent)
            })
            .transpose()?;

        let verifier = CitationVerifier::new(
            HttpPageFetcher::new(config.page_fetch_timeout_secs, &config.user_agent)?,
            LexicalOverlap,
            policy.verifier.clone(),
            policy.risk.clone(),
        );

        Ok(Self {
            policy,
            engine,
            notifier,
            verifier,
            feed: ChangeFeed::default(),
            max_concurrent: config.max_concurrent_jobs,
        })
    }

    #[must_use]
    pub fn analyzer<'a>(
        &'a self,
        pool: &'a PgPool,
    ) -> Analyzer<'a, OpenAiAnswerClient, Option<SerpApiClient>, Option<WebhookNotifier>> {
        Analyzer::new(
            pool,
            &self.engine,
            &self.notifier,
            &self.policy,
            self.max_concurrent,
        )
        .with_feed(&self.feed)
    }

    /// # Errors
    ///
    /// See [`verify_citations`].
    pub async fn verify_citations(
        &self,
        pool: &PgPool,
        selection: CitationSelection,
        limit: i64,
    ) -> Result<VerifySummary, PipelineError> {
        verify_citations(
            pool,
            &self.verifier,
            selection,
            limit,
            self.max_concurrent,
            Some(&self.feed),
        )
        .await
    }

    /// # Errors
    ///
    /// See [`reverify_citation`].
    pub async fn reverify_citation(
        &self,
        pool: &PgPool,
        id: i64,
    ) -> Result<Verification, PipelineError> {
        reverify_citation(pool, &self.verifier, id, Some(&self.feed)).await
    }

    /// # Errors
    ///
    /// See [`recompute_trust`].
    pub async fn recompute_trust(
        &self,
        pool: &PgPool,
        date: NaiveDate,
    ) -> Result<TrustRecomputeSummary, PipelineError> {
        recompute_trust(pool, date, &self.policy.trends, Some(&self.feed)).await
    }
}
