//! Analysis job record and the request that creates it.

use aivis_core::{CoreError, JobPhase, Sentiment};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// A brand or competitor as named in answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedEntity {
    pub name: String,
    pub domain: Option<String>,
}

impl TrackedEntity {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: None,
        }
    }

    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

/// Everything needed to analyze one prompt with one model and persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub prompt_id: i64,
    pub prompt_text: String,
    pub brand: TrackedEntity,
    pub competitors: Vec<TrackedEntity>,
    pub model: String,
    pub persona: String,
}

impl JobRequest {
    /// Reject requests missing a prompt, brand, or model.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Validation`] naming the first missing field.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.prompt_text.trim().is_empty() {
            return Err(AnalysisError::Validation(
                "prompt text must be non-empty".to_string(),
            ));
        }
        if self.brand.name.trim().is_empty() {
            return Err(AnalysisError::Validation(
                "tracked brand name must be non-empty".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(AnalysisError::Validation(
                "model identifier must be non-empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// One analysis run. Only the job engine mutates it, one phase at a time.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisJob {
    /// Assigned once the recorder has persisted the pending job.
    pub id: Option<i64>,
    pub prompt_id: i64,
    pub model: String,
    pub persona: String,
    pub phase: JobPhase,
    pub brand_mentioned: bool,
    pub sentiment: Option<Sentiment>,
    pub confidence: Option<f64>,
    pub visibility_score: Option<f64>,
    pub reasoning: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    history: Vec<JobPhase>,
}

impl AnalysisJob {
    #[must_use]
    pub fn new(prompt_id: i64, model: impl Into<String>, persona: impl Into<String>) -> Self {
        Self {
            id: None,
            prompt_id,
            model: model.into(),
            persona: persona.into(),
            phase: JobPhase::Pending,
            brand_mentioned: false,
            sentiment: None,
            confidence: None,
            visibility_score: None,
            reasoning: None,
            created_at: Utc::now(),
            completed_at: None,
            history: vec![JobPhase::Pending],
        }
    }

    #[must_use]
    pub fn for_request(request: &JobRequest) -> Self {
        Self::new(request.prompt_id, &request.model, &request.persona)
    }

    /// Move to `to`, stamping `completed_at` on entry to a terminal phase.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransition`] and leaves the job untouched
    /// if `to` is not a legal successor of the current phase.
    pub fn advance(&mut self, to: JobPhase) -> Result<(), CoreError> {
        let next = self.phase.advance_to(to)?;
        self.phase = next;
        self.history.push(next);
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Move to `failed`, recording `reason` verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransition`] if the job is already terminal.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), CoreError> {
        self.advance(JobPhase::Failed)?;
        self.reasoning = Some(reason.into());
        Ok(())
    }

    /// Phases the job has passed through, starting with `pending`.
    #[must_use]
    pub fn phase_history(&self) -> &[JobPhase] {
        &self.history
    }
}
