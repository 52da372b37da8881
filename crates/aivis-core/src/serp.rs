//! Search-engine-results-page snapshot gathered during the scraping phase.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganicResult {
    pub title: String,
    #[serde(alias = "link")]
    pub url: String,
    #[serde(default)]
    pub snippet: Option<String>,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorPosition {
    pub name: String,
    pub position: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerpSnapshot {
    pub brand_in_results: bool,
    pub position: Option<u32>,
    pub ai_overview: Option<String>,
    #[serde(default)]
    pub organic_results: Vec<OrganicResult>,
    #[serde(default)]
    pub competitor_positions: Vec<CompetitorPosition>,
}

impl SerpSnapshot {
    /// Short text block passed to the answering engine as grounding context.
    #[must_use]
    pub fn as_context(&self, max_results: usize) -> String {
        let mut lines = Vec::new();
        if let Some(overview) = &self.ai_overview {
            lines.push(format!("Search overview: {overview}"));
        }
        for result in self.organic_results.iter().take(max_results) {
            match &result.snippet {
                Some(snippet) => lines.push(format!(
                    "{}. {} ({}) - {snippet}",
                    result.position, result.title, result.url
                )),
                None => lines.push(format!(
                    "{}. {} ({})",
                    result.position, result.title, result.url
                )),
            }
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_includes_overview_and_limits_results() {
        let snapshot = SerpSnapshot {
            brand_in_results: true,
            position: Some(2),
            ai_overview: Some("Acme is popular".to_string()),
            organic_results: (1..=5)
                .map(|i| OrganicResult {
                    title: format!("Result {i}"),
                    url: format!("https://r{i}.example"),
                    snippet: None,
                    position: i,
                })
                .collect(),
            competitor_positions: vec![],
        };
        let context = snapshot.as_context(2);
        assert!(context.starts_with("Search overview: Acme is popular"));
        assert!(context.contains("Result 2"));
        assert!(!context.contains("Result 3"));
    }
}
