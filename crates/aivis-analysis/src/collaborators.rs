//! External collaborators consumed by the job engine.
//!
//! Production implementations live in [`crate::answer_client`] and
//! [`crate::serp_client`]; tests substitute in-memory fakes.

use std::future::Future;

use aivis_core::SerpSnapshot;

use crate::error::AnalysisError;
use crate::job::TrackedEntity;

/// One question put to an answering engine.
#[derive(Debug, Clone, Copy)]
pub struct AnswerRequest<'a> {
    pub prompt: &'a str,
    pub model: &'a str,
    pub persona: &'a str,
    /// Grounding text built from the SERP snapshot, when one was gathered.
    pub context: Option<&'a str>,
}

/// Turns a prompt into a model's free-text answer.
pub trait AnsweringEngine: Send + Sync {
    /// # Errors
    ///
    /// Returns [`AnalysisError`] on transport failure, non-success status, or
    /// an unparseable response body.
    fn answer(
        &self,
        request: AnswerRequest<'_>,
    ) -> impl Future<Output = Result<String, AnalysisError>> + Send;
}

#[derive(Debug, Clone, Copy)]
pub struct SerpQuery<'a> {
    pub query: &'a str,
    pub brand: &'a TrackedEntity,
    pub competitors: &'a [TrackedEntity],
}

/// Produces a search-results snapshot for a brand and query.
///
/// `Ok(None)` means the provider has nothing for this query; the job continues
/// without grounding context.
pub trait SerpProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns [`AnalysisError`] when the provider call fails. The engine logs
    /// the failure and proceeds without a snapshot.
    fn snapshot(
        &self,
        query: SerpQuery<'_>,
    ) -> impl Future<Output = Result<Option<SerpSnapshot>, AnalysisError>> + Send;
}

/// An unconfigured provider yields no snapshot.
impl<S: SerpProvider> SerpProvider for Option<S> {
    async fn snapshot(
        &self,
        query: SerpQuery<'_>,
    ) -> Result<Option<SerpSnapshot>, AnalysisError> {
        match self {
            Some(provider) => provider.snapshot(query).await,
            None => Ok(None),
        }
    }
}
