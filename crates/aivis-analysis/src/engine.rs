//! The job engine: drives one analysis job through its phases.
//!
//! Phase advancement is the only point where the persisted job record changes.
//! Collaborator failures end the job in `failed` with the error text as its
//! reasoning; persistence failures are returned to the caller.

use std::future::Future;
use std::time::Duration;

use aivis_core::{AppConfig, JobPhase, ScoringWeights, SerpSnapshot, TrackingPolicy};

use crate::collaborators::{AnswerRequest, AnsweringEngine, SerpProvider, SerpQuery};
use crate::error::AnalysisError;
use crate::job::{AnalysisJob, JobRequest};
use crate::judge::{judge_answer, Judgement};
use crate::retry::retry_with_backoff;

/// Organic results included in the grounding context.
const CONTEXT_RESULTS: usize = 5;

/// Durable record of a job's progress.
pub trait JobRecorder: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Persist a new `pending` job and return its id.
    fn create_job(&self, job: &AnalysisJob)
        -> impl Future<Output = Result<i64, Self::Error>> + Send;

    /// Persist the job's current phase, and its reasoning if it failed.
    fn record_phase(
        &self,
        job: &AnalysisJob,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn record_serp(
        &self,
        job: &AnalysisJob,
        snapshot: &SerpSnapshot,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Persist the completed job together with its scored result.
    fn record_completion(
        &self,
        job: &AnalysisJob,
        judgement: &Judgement,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub upstream_timeout: Duration,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub scoring: ScoringWeights,
}

impl EngineSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig, policy: &TrackingPolicy) -> Self {
        Self {
            upstream_timeout: Duration::from_secs(config.upstream_timeout_secs),
            max_retries: config.upstream_max_retries,
            backoff_base_ms: config.upstream_backoff_base_ms,
            scoring: policy.scoring.clone(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            upstream_timeout: Duration::from_secs(60),
            max_retries: 2,
            backoff_base_ms: 1_000,
            scoring: ScoringWeights::default(),
        }
    }
}

/// Final state of a job. `judgement` is present only when the job completed.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job: AnalysisJob,
    pub judgement: Option<Judgement>,
}

pub struct JobEngine<A, S> {
    answerer: A,
    serp: S,
    settings: EngineSettings,
}

impl<A, S> JobEngine<A, S>
where
    A: AnsweringEngine,
    S: SerpProvider,
{
    pub fn new(answerer: A, serp: S, settings: EngineSettings) -> Self {
        Self {
            answerer,
            serp,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Validate `request`, create its job record, and run it to a terminal phase.
    ///
    /// # Errors
    ///
    /// - [`AnalysisError::Validation`] before any job record exists.
    /// - [`AnalysisError::Persistence`] if the recorder fails at any step.
    ///
    /// Collaborator failures are not errors here: the returned job is `failed`.
    pub async fn submit_job<R: JobRecorder>(
        &self,
        request: &JobRequest,
        recorder: &R,
    ) -> Result<JobReport, AnalysisError> {
        request.validate()?;
        let mut job = AnalysisJob::for_request(request);
        let id = recorder
            .create_job(&job)
            .await
            .map_err(AnalysisError::persistence)?;
        job.id = Some(id);
        tracing::debug!(
            job_id = id,
            prompt_id = job.prompt_id,
            model = %job.model,
            "job created"
        );
        self.run(job, request, recorder).await
    }

    /// Drive an already-recorded `pending` job to `complete` or `failed`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Persistence`] when the recorder fails and
    /// [`AnalysisError::Core`] if `job` is not `pending`.
    pub async fn run<R: JobRecorder>(
        &self,
        mut job: AnalysisJob,
        request: &JobRequest,
        recorder: &R,
    ) -> Result<JobReport, AnalysisError> {
        Self::transition(&mut job, JobPhase::Scraping, recorder).await?;
        let serp = self.gather_serp(request).await;
        if let Some(snapshot) = &serp {
            recorder
                .record_serp(&job, snapshot)
                .await
                .map_err(AnalysisError::persistence)?;
        }

        Self::transition(&mut job, JobPhase::Thinking, recorder).await?;
        let context = serp.as_ref().map(|s| s.as_context(CONTEXT_RESULTS));
        let answer = match self.ask(request, context.as_deref()).await {
            Ok(answer) => answer,
            Err(err) if err.is_upstream() => {
                tracing::warn!(
                    job_id = ?job.id,
                    prompt_id = job.prompt_id,
                    model = %job.model,
                    error = %err,
                    "answering engine failed, marking job failed"
                );
                job.fail(err.to_string())?;
                recorder
                    .record_phase(&job)
                    .await
                    .map_err(AnalysisError::persistence)?;
                return Ok(JobReport {
                    job,
                    judgement: None,
                });
            }
            Err(err) => return Err(err),
        };

        Self::transition(&mut job, JobPhase::Judging, recorder).await?;
        let judgement = judge_answer(
            &answer,
            &request.brand,
            &request.competitors,
            serp.as_ref(),
            &self.settings.scoring,
        );

        job.brand_mentioned = judgement.brand_mentioned;
        job.sentiment = judgement.sentiment;
        job.confidence = Some(judgement.confidence);
        job.visibility_score = Some(judgement.visibility_score);
        job.reasoning = Some(judgement.reasoning.clone());
        job.advance(JobPhase::Complete)?;
        recorder
            .record_completion(&job, &judgement)
            .await
            .map_err(AnalysisError::persistence)?;

        tracing::info!(
            job_id = ?job.id,
            prompt_id = job.prompt_id,
            model = %job.model,
            persona = %job.persona,
            visibility_score = judgement.visibility_score,
            "job complete"
        );
        Ok(JobReport {
            job,
            judgement: Some(judgement),
        })
    }

    async fn transition<R: JobRecorder>(
        job: &mut AnalysisJob,
        to: JobPhase,
        recorder: &R,
    ) -> Result<(), AnalysisError> {
        job.advance(to)?;
        recorder
            .record_phase(job)
            .await
            .map_err(AnalysisError::persistence)
    }

    /// A missing or failed snapshot is not fatal.
    async fn gather_serp(&self, request: &JobRequest) -> Option<SerpSnapshot> {
        let query = SerpQuery {
            query: &request.prompt_text,
            brand: &request.brand,
            competitors: &request.competitors,
        };
        match tokio::time::timeout(self.settings.upstream_timeout, self.serp.snapshot(query)).await
        {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(err)) => {
                tracing::warn!(
                    prompt_id = request.prompt_id,
                    error = %err,
                    "SERP lookup failed, continuing without it"
                );
                None
            }
            Err(_) => {
                tracing::warn!(
                    prompt_id = request.prompt_id,
                    timeout_secs = self.settings.upstream_timeout.as_secs(),
                    "SERP lookup timed out, continuing without it"
                );
                None
            }
        }
    }

    async fn ask(
        &self,
        request: &JobRequest,
        context: Option<&str>,
    ) -> Result<String, AnalysisError> {
        let answer_request = AnswerRequest {
            prompt: &request.prompt_text,
            model: &request.model,
            persona: &request.persona,
            context,
        };
        let timeout = self.settings.upstream_timeout;
        let answer = retry_with_backoff(
            self.settings.max_retries,
            self.settings.backoff_base_ms,
            || async move {
                tokio::time::timeout(timeout, self.answerer.answer(answer_request))
                    .await
                    .map_err(|_| AnalysisError::Timeout {
                        collaborator: "answering engine",
                        secs: timeout.as_secs(),
                    })?
            },
        )
        .await?;

        if answer.trim().is_empty() {
            return Err(AnalysisError::EmptyAnswer {
                model: request.model.clone(),
            });
        }
        Ok(answer)
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
