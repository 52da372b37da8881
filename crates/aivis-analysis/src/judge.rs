//! Judging phase: turn a raw answer into mention, rank, sentiment, citations,
//! competitor standings, a visibility score, and recommendations.

use aivis_core::{Citation, ScoringWeights, Sentiment, SerpSnapshot};
use aivis_trust::domain_of;
use serde::{Deserialize, Serialize};

use crate::detect::{
    detect_mention, extract_citations, extract_ranks, mention_offsets, split_sentences,
    truncate_chars,
};
use crate::job::TrackedEntity;
use crate::scorer::{classify_sentiment, lexicon_score, visibility_score, ScoreInputs};

const SNIPPET_MAX_CHARS: usize = 280;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorStanding {
    pub name: String,
    pub mentioned: bool,
    pub rank: Option<u32>,
    pub sentiment: Option<Sentiment>,
    pub visibility_score: f64,
}

/// Outcome of judging one answer for one tracked brand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgement {
    pub brand_mentioned: bool,
    pub mention_count: usize,
    pub rank: Option<u32>,
    pub sentiment: Option<Sentiment>,
    pub sentiment_score: f64,
    pub citations: Vec<Citation>,
    pub competitors: Vec<CompetitorStanding>,
    pub visibility_score: f64,
    /// Share of evidence sources present: answer text, SERP snapshot,
    /// citations, and a resolvable rank.
    pub confidence: f64,
    pub recommendations: Vec<String>,
    pub reasoning: String,
    pub snippet: String,
}

impl Judgement {
    /// The highest-scoring competitor, if any competitor was mentioned.
    #[must_use]
    pub fn leading_competitor(&self) -> Option<&CompetitorStanding> {
        self.competitors
            .iter()
            .filter(|c| c.mentioned)
            .max_by(|a, b| a.visibility_score.total_cmp(&b.visibility_score))
    }
}

struct EntityFacts {
    mentioned: bool,
    mentions: usize,
    sentiment: Option<Sentiment>,
    sentiment_score: f64,
    citations: usize,
}

fn entity_facts(answer: &str, entity: &TrackedEntity, citations: &[Citation]) -> EntityFacts {
    let mentions = mention_offsets(answer, &entity.name).len();
    let mentioned = mentions > 0;

    let (sentiment, sentiment_score) = if mentioned {
        let about: Vec<&str> = split_sentences(answer)
            .into_iter()
            .filter(|s| detect_mention(s, &entity.name))
            .collect();
        let score = lexicon_score(&about.join(" "));
        (Some(classify_sentiment(score)), score)
    } else {
        (None, 0.0)
    };

    let own_domain = entity.domain.as_deref().and_then(domain_of);
    let supporting = citations
        .iter()
        .filter(|c| {
            let on_domain = own_domain.is_some() && domain_of(&c.url) == own_domain;
            let in_snippet = c
                .snippet
                .as_deref()
                .is_some_and(|s| detect_mention(s, &entity.name));
            on_domain || in_snippet
        })
        .count();

    EntityFacts {
        mentioned,
        mentions,
        sentiment,
        sentiment_score,
        citations: supporting,
    }
}

/// Judge `answer` for `brand` against `competitors`.
#[must_use]
pub fn judge_answer(
    answer: &str,
    brand: &TrackedEntity,
    competitors: &[TrackedEntity],
    serp: Option<&SerpSnapshot>,
    weights: &ScoringWeights,
) -> Judgement {
    let citations = extract_citations(answer);

    let mut names: Vec<&str> = Vec::with_capacity(competitors.len() + 1);
    names.push(&brand.name);
    names.extend(competitors.iter().map(|c| c.name.as_str()));
    let ranks = extract_ranks(answer, &names);

    let brand_facts = entity_facts(answer, brand, &citations);
    let brand_rank = ranks.first().copied().flatten();
    let score = visibility_score(
        &ScoreInputs {
            mentioned: brand_facts.mentioned,
            rank: brand_rank,
            sentiment: brand_facts.sentiment,
            citations: brand_facts.citations,
        },
        weights,
    );

    let standings: Vec<CompetitorStanding> = competitors
        .iter()
        .zip(ranks.iter().skip(1))
        .map(|(competitor, rank)| {
            let facts = entity_facts(answer, competitor, &citations);
            CompetitorStanding {
                name: competitor.name.clone(),
                mentioned: facts.mentioned,
                rank: *rank,
                sentiment: facts.sentiment,
                visibility_score: visibility_score(
                    &ScoreInputs {
                        mentioned: facts.mentioned,
                        rank: *rank,
                        sentiment: facts.sentiment,
                        citations: facts.citations,
                    },
                    weights,
                ),
            }
        })
        .collect();

    let evidence = [
        !answer.trim().is_empty(),
        serp.is_some(),
        !citations.is_empty(),
        brand_rank.is_some(),
    ];
    let present = evidence.iter().filter(|&&p| p).count();
    #[allow(clippy::cast_precision_loss)]
    let confidence = present as f64 / evidence.len() as f64;

    let mut judgement = Judgement {
        brand_mentioned: brand_facts.mentioned,
        mention_count: brand_facts.mentions,
        rank: brand_rank,
        sentiment: brand_facts.sentiment,
        sentiment_score: brand_facts.sentiment_score,
        citations,
        competitors: standings,
        visibility_score: score,
        confidence,
        recommendations: Vec::new(),
        reasoning: String::new(),
        snippet: truncate_chars(answer.trim(), SNIPPET_MAX_CHARS),
    };
    judgement.recommendations = recommendations(&judgement, brand, serp);
    judgement.reasoning = reasoning(&judgement, brand, names.len());
    judgement
}

fn recommendations(
    judgement: &Judgement,
    brand: &TrackedEntity,
    serp: Option<&SerpSnapshot>,
) -> Vec<String> {
    let mut out = Vec::new();
    let name = &brand.name;

    if !judgement.brand_mentioned {
        out.push(format!(
            "{name} is not mentioned; publish content that directly answers this prompt"
        ));
    }

    let ahead: Vec<&str> = judgement
        .competitors
        .iter()
        .filter(|c| match (c.rank, judgement.rank) {
            (Some(theirs), Some(ours)) => theirs < ours,
            (Some(_), None) => true,
            _ => false,
        })
        .map(|c| c.name.as_str())
        .collect();
    if !ahead.is_empty() {
        out.push(format!(
            "{} ranked ahead of {name}; compare positioning against them",
            ahead.join(", ")
        ));
    }

    if judgement.sentiment == Some(Sentiment::Negative) {
        out.push(format!(
            "answer describes {name} negatively; address the cited weaknesses"
        ));
    }

    if judgement.citations.is_empty() {
        out.push("answer cites no sources; earn coverage on citable third-party pages".to_string());
    } else if let Some(own) = brand.domain.as_deref().and_then(domain_of) {
        let cites_own = judgement
            .citations
            .iter()
            .any(|c| domain_of(&c.url).as_deref() == Some(own.as_str()));
        if !cites_own {
            out.push(format!(
                "no citation points at {own}; make key pages easier to cite"
            ));
        }
    }

    if serp.is_some_and(|s| !s.brand_in_results) {
        out.push(format!(
            "{name} is absent from search results for this prompt"
        ));
    }

    out
}

fn reasoning(judgement: &Judgement, brand: &TrackedEntity, entities: usize) -> String {
    if !judgement.brand_mentioned {
        return format!(
            "{} not mentioned; {} citation(s) found; visibility {:.2}",
            brand.name,
            judgement.citations.len(),
            judgement.visibility_score
        );
    }
    let rank = judgement
        .rank
        .map_or_else(|| "unranked".to_string(), |r| format!("ranked #{r} of {entities}"));
    let sentiment = judgement.sentiment.map_or("unknown", Sentiment::as_str);
    format!(
        "{} mentioned {} time(s), {rank}, sentiment {sentiment} ({:.2}); {} citation(s); visibility {:.2}",
        brand.name,
        judgement.mention_count,
        judgement.sentiment_score,
        judgement.citations.len(),
        judgement.visibility_score
    )
}
