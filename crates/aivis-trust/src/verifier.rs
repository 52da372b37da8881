//! Citation verification: classify a cited URL against the claim it supports.

use aivis_core::{HallucinationRisk, RiskCutPoints, VerificationStatus, VerifierThresholds};
use serde::{Deserialize, Serialize};

use crate::page::{content_hash, PageFetcher};
use crate::similarity::SimilarityScorer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub status: VerificationStatus,
    /// Equal to the claim/page similarity; 0 when the page was unreachable.
    pub trust_score: f64,
    pub risk: HallucinationRisk,
    /// Hash of the page text the score was computed from, if any.
    pub content_hash: Option<String>,
    /// Why the page could not be used, when it could not.
    pub failure: Option<String>,
}

/// Reporting bucket for a trust score. Never drives status transitions.
#[must_use]
pub fn hallucination_risk(trust_score: f64, cuts: &RiskCutPoints) -> HallucinationRisk {
    if trust_score >= cuts.low {
        HallucinationRisk::Low
    } else if trust_score >= cuts.medium {
        HallucinationRisk::Medium
    } else if trust_score >= cuts.high {
        HallucinationRisk::High
    } else {
        HallucinationRisk::VeryHigh
    }
}

fn classify(similarity: f64, thresholds: &VerifierThresholds) -> VerificationStatus {
    if similarity >= thresholds.high {
        VerificationStatus::Verified
    } else if similarity < thresholds.low {
        VerificationStatus::Hallucinated
    } else {
        VerificationStatus::Unverified
    }
}

/// Verify `claim` against already-fetched page text. `None` content means the
/// page was unreachable and the citation is treated as hallucinated.
///
/// Deterministic for a deterministic scorer: identical `(claim, content)`
/// always yields an identical [`Verification`].
#[must_use]
pub fn verify_citation<S: SimilarityScorer + ?Sized>(
    claim: &str,
    content: Option<&str>,
    scorer: &S,
    thresholds: &VerifierThresholds,
    cuts: &RiskCutPoints,
) -> Verification {
    let Some(content) = content else {
        return Verification {
            status: VerificationStatus::Hallucinated,
            trust_score: 0.0,
            risk: hallucination_risk(0.0, cuts),
            content_hash: None,
            failure: Some("page content unavailable".to_string()),
        };
    };

    let similarity = scorer.similarity(claim, content).clamp(0.0, 1.0);
    let trust_score = (similarity * 10_000.0).round() / 10_000.0;
    Verification {
        status: classify(trust_score, thresholds),
        trust_score,
        risk: hallucination_risk(trust_score, cuts),
        content_hash: Some(content_hash(content)),
        failure: None,
    }
}

/// Fetches cited pages and verifies claims against them.
pub struct CitationVerifier<F, S> {
    fetcher: F,
    scorer: S,
    thresholds: VerifierThresholds,
    cuts: RiskCutPoints,
}

impl<F: PageFetcher, S: SimilarityScorer> CitationVerifier<F, S> {
    pub fn new(
        fetcher: F,
        scorer: S,
        thresholds: VerifierThresholds,
        cuts: RiskCutPoints,
    ) -> Self {
        Self {
            fetcher,
            scorer,
            thresholds,
            cuts,
        }
    }

    /// Verify `claim` for `url`, using `provided_content` instead of fetching
    /// when the caller already has the page text.
    pub async fn verify(
        &self,
        url: &str,
        claim: &str,
        provided_content: Option<&str>,
    ) -> Verification {
        if let Some(content) = provided_content {
            return self.score(claim, Some(content));
        }
        match self.fetcher.fetch_text(url).await {
            Ok(text) => self.score(claim, Some(&text)),
            Err(e) => {
                tracing::warn!(url, error = %e, "cited page unreachable, marking hallucinated");
                let mut verification = self.score(claim, None);
                verification.failure = Some(e.to_string());
                verification
            }
        }
    }

    fn score(&self, claim: &str, content: Option<&str>) -> Verification {
        verify_citation(claim, content, &self.scorer, &self.thresholds, &self.cuts)
    }
}
