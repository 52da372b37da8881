//! Citation heatmap: the URL ledger grouped by domain.

use std::collections::{BTreeMap, BTreeSet};

use aivis_core::VerificationStatus;
use serde::{Deserialize, Serialize};

use crate::stats::{mean, round6};

/// One row of the URL citation ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub url: String,
    pub domain: String,
    pub citation_count: i64,
    pub engines: Vec<String>,
    pub status: VerificationStatus,
    pub trust_score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusBreakdown {
    pub pending: i64,
    pub verified: i64,
    pub unverified: i64,
    pub hallucinated: i64,
}

impl StatusBreakdown {
    fn count(&mut self, status: VerificationStatus) {
        let slot = match status {
            VerificationStatus::Pending => &mut self.pending,
            VerificationStatus::Verified => &mut self.verified,
            VerificationStatus::Unverified => &mut self.unverified,
            VerificationStatus::Hallucinated => &mut self.hallucinated,
        };
        *slot += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainHeat {
    pub domain: String,
    pub total_citations: i64,
    pub url_count: usize,
    /// Unweighted mean trust over the domain's checked URLs; 0 if none are checked.
    pub mean_trust: f64,
    pub engines: Vec<String>,
    pub statuses: StatusBreakdown,
}

#[derive(Default)]
struct Acc<'a> {
    total: i64,
    urls: usize,
    trust: Vec<f64>,
    engines: BTreeSet<&'a str>,
    statuses: StatusBreakdown,
}

/// Group `entries` by domain, sorted by total citations descending and then
/// domain ascending.
#[must_use]
pub fn build_heatmap(entries: &[LedgerEntry]) -> Vec<DomainHeat> {
    let mut by_domain: BTreeMap<&str, Acc<'_>> = BTreeMap::new();
    for entry in entries {
        let acc = by_domain.entry(entry.domain.as_str()).or_default();
        acc.total += entry.citation_count.max(0);
        acc.urls += 1;
        acc.statuses.count(entry.status);
        acc.engines.extend(entry.engines.iter().map(String::as_str));
        if entry.status.has_trust_score() {
            if let Some(score) = entry.trust_score {
                acc.trust.push(score);
            }
        }
    }

    let mut heat: Vec<DomainHeat> = by_domain
        .into_iter()
        .map(|(domain, acc)| DomainHeat {
            domain: domain.to_string(),
            total_citations: acc.total,
            url_count: acc.urls,
            mean_trust: mean(&acc.trust).map_or(0.0, round6),
            engines: acc.engines.into_iter().map(str::to_string).collect(),
            statuses: acc.statuses,
        })
        .collect();
    heat.sort_by(|a, b| {
        b.total_citations
            .cmp(&a.total_citations)
            .then_with(|| a.domain.cmp(&b.domain))
    });
    heat
}

/// The `n` hottest domains.
#[must_use]
pub fn top_domains(entries: &[LedgerEntry], n: usize) -> Vec<DomainHeat> {
    let mut heat = build_heatmap(entries);
    heat.truncate(n);
    heat
}

/// Heatmap restricted to URLs cited by `engine`.
#[must_use]
pub fn domains_for_engine(entries: &[LedgerEntry], engine: &str) -> Vec<DomainHeat> {
    let filtered: Vec<LedgerEntry> = entries
        .iter()
        .filter(|e| e.engines.iter().any(|name| name == engine))
        .cloned()
        .collect();
    build_heatmap(&filtered)
}
