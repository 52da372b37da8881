//! Claim-to-page similarity scoring.

use std::collections::HashSet;

/// Scores how well `content` supports `claim`, in `[0, 1]`.
///
/// Implementations must be deterministic: the verifier relies on identical
/// inputs producing identical scores.
pub trait SimilarityScorer: Send + Sync {
    fn similarity(&self, claim: &str, content: &str) -> f64;
}

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "has", "had", "her",
    "was", "one", "our", "out", "his", "its", "who", "how", "why", "with", "that", "this", "from",
    "they", "have", "what", "when", "which", "will", "your", "than", "then", "them", "into",
    "also", "more", "most", "been", "were", "their", "there", "about", "would", "could",
    "should",
];

/// Share of the claim's distinct content words that appear in the page.
///
/// Words shorter than three characters and common stopwords are ignored. A
/// claim with no content words scores 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalOverlap;

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

impl SimilarityScorer for LexicalOverlap {
    fn similarity(&self, claim: &str, content: &str) -> f64 {
        let claim_terms = terms(claim);
        if claim_terms.is_empty() {
            return 0.0;
        }
        let page_terms = terms(content);
        let supported = claim_terms.intersection(&page_terms).count();
        #[allow(clippy::cast_precision_loss)]
        let score = supported as f64 / claim_terms.len() as f64;
        score.clamp(0.0, 1.0)
    }
}
