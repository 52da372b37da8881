//! Sentiment lexicon and the weighted 0–100 visibility score.

use aivis_core::{ScoringWeights, Sentiment};

/// Word weights for how an answer talks about an entity.
///
/// Keys are lowercase single words. Values in `(0.0, 1.0]` are positive,
/// in `[-1.0, 0.0)` are negative. The final score is clamped to `[-1.0, 1.0]`.
pub(crate) const LEXICON: &[(&str, f64)] = &[
    // Positive signals
    ("best", 0.5),
    ("excellent", 0.5),
    ("leading", 0.4),
    ("recommend", 0.4),
    ("recommended", 0.4),
    ("reliable", 0.4),
    ("trusted", 0.4),
    ("popular", 0.3),
    ("great", 0.4),
    ("good", 0.3),
    ("strong", 0.3),
    ("powerful", 0.3),
    ("intuitive", 0.3),
    ("affordable", 0.3),
    ("innovative", 0.3),
    ("favorite", 0.4),
    ("top", 0.3),
    ("praised", 0.4),
    // Negative signals
    ("worst", -0.6),
    ("poor", -0.5),
    ("bad", -0.4),
    ("expensive", -0.3),
    ("overpriced", -0.5),
    ("unreliable", -0.5),
    ("buggy", -0.5),
    ("slow", -0.3),
    ("outdated", -0.4),
    ("complaints", -0.4),
    ("lawsuit", -0.5),
    ("breach", -0.6),
    ("avoid", -0.6),
    ("limited", -0.2),
    ("lacks", -0.3),
    ("criticized", -0.4),
    ("problem", -0.3),
    ("issues", -0.3),
];

const POSITIVE_CUTOFF: f64 = 0.1;
const NEGATIVE_CUTOFF: f64 = -0.1;

/// Score a text string using the lexicon.
///
/// Splits text into lowercase words, sums matching weights, and clamps
/// the result to `[-1.0, 1.0]`. Returns `0.0` for empty or unknown text.
#[must_use]
pub fn lexicon_score(text: &str) -> f64 {
    let mut score = 0.0_f64;
    for word in text.split_whitespace() {
        let w = word
            .trim_matches(|c: char| !c.is_alphabetic())
            .to_lowercase();
        if let Some(&(_, weight)) = LEXICON.iter().find(|(lex_word, _)| *lex_word == w) {
            score += weight;
        }
    }
    score.clamp(-1.0, 1.0)
}

#[must_use]
pub fn classify_sentiment(score: f64) -> Sentiment {
    if score > POSITIVE_CUTOFF {
        Sentiment::Positive
    } else if score < NEGATIVE_CUTOFF {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

/// Judged facts about one entity in one answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreInputs {
    pub mentioned: bool,
    pub rank: Option<u32>,
    pub sentiment: Option<Sentiment>,
    pub citations: usize,
}

/// Combine judged facts into a 0–100 visibility score.
///
/// An unmentioned entity scores 0. Otherwise each component contributes its
/// weight scaled as documented on [`ScoringWeights`]. Rounded to two decimals.
#[must_use]
pub fn visibility_score(inputs: &ScoreInputs, weights: &ScoringWeights) -> f64 {
    if !inputs.mentioned {
        return 0.0;
    }

    let max_rank = f64::from(weights.max_rank.max(1));
    let rank_factor = match inputs.rank {
        Some(r) if r >= 1 && r <= weights.max_rank => (max_rank - f64::from(r) + 1.0) / max_rank,
        _ => 0.0,
    };

    let sentiment_factor = match inputs.sentiment {
        Some(Sentiment::Positive) => 1.0,
        Some(Sentiment::Neutral) | None => 0.5,
        Some(Sentiment::Negative) => 0.0,
    };

    let cap = weights.citation_cap.max(1);
    let cited = u32::try_from(inputs.citations).unwrap_or(u32::MAX).min(cap);
    let citation_factor = f64::from(cited) / f64::from(cap);

    let raw = weights.mention
        + weights.rank * rank_factor
        + weights.sentiment * sentiment_factor
        + weights.citations * citation_factor;

    (raw.clamp(0.0, 100.0) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(
        mentioned: bool,
        rank: Option<u32>,
        sentiment: Option<Sentiment>,
        citations: usize,
    ) -> ScoreInputs {
        ScoreInputs {
            mentioned,
            rank,
            sentiment,
            citations,
        }
    }

    #[test]
    fn empty_text_scores_zero() {
        assert!(lexicon_score("").abs() < f64::EPSILON);
    }

    #[test]
    fn positive_and_negative_words() {
        assert!(lexicon_score("Acme is the best and most reliable choice") > 0.0);
        assert!(lexicon_score("Acme is buggy and overpriced") < 0.0);
    }

    #[test]
    fn score_is_clamped() {
        let text = "best excellent leading recommend reliable trusted great favorite";
        assert!((lexicon_score(text) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn classification_uses_dead_zone() {
        assert_eq!(classify_sentiment(0.05), Sentiment::Neutral);
        assert_eq!(classify_sentiment(0.3), Sentiment::Positive);
        assert_eq!(classify_sentiment(-0.3), Sentiment::Negative);
    }

    #[test]
    fn unmentioned_scores_zero() {
        let w = ScoringWeights::default();
        let score = visibility_score(&inputs(false, Some(1), Some(Sentiment::Positive), 9), &w);
        assert!(score.abs() < f64::EPSILON);
    }

    #[test]
    fn perfect_answer_scores_100() {
        let w = ScoringWeights::default();
        let score = visibility_score(&inputs(true, Some(1), Some(Sentiment::Positive), 5), &w);
        assert!((score - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn absent_rank_is_penalized() {
        let w = ScoringWeights::default();
        let ranked = visibility_score(&inputs(true, Some(3), None, 0), &w);
        let unranked = visibility_score(&inputs(true, None, None, 0), &w);
        // 40 + 30 * 8/10 + 10 = 74; unranked loses the rank component.
        assert!((ranked - 74.0).abs() < 1e-9, "{ranked}");
        assert!((unranked - 50.0).abs() < 1e-9, "{unranked}");
    }

    #[test]
    fn rank_past_max_earns_nothing() {
        let w = ScoringWeights::default();
        let score = visibility_score(&inputs(true, Some(11), Some(Sentiment::Negative), 0), &w);
        assert!((score - 40.0).abs() < 1e-9);
    }

    #[test]
    fn citations_are_capped() {
        let w = ScoringWeights::default();
        let five = visibility_score(&inputs(true, None, Some(Sentiment::Negative), 5), &w);
        let fifty = visibility_score(&inputs(true, None, Some(Sentiment::Negative), 50), &w);
        assert!((five - fifty).abs() < f64::EPSILON);
        assert!((five - 50.0).abs() < 1e-9);
    }
}
