//! Search-results provider backed by a SerpAPI-style JSON endpoint.

use std::time::Duration;

use aivis_core::{CompetitorPosition, OrganicResult, SerpSnapshot};
use aivis_trust::domain_of;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;

use crate::collaborators::{SerpProvider, SerpQuery};
use crate::detect::detect_mention;
use crate::error::AnalysisError;
use crate::job::TrackedEntity;

const DEFAULT_BASE_URL: &str = "https://serpapi.com";
const COLLABORATOR: &str = "SERP provider";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic_results: Vec<RawOrganic>,
    #[serde(default)]
    ai_overview: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawOrganic {
    position: Option<u32>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: Option<String>,
}

/// Client for `GET {base}/search`.
pub struct SerpApiClient {
    client: Client,
    api_key: Option<String>,
    endpoint: Url,
}

impl SerpApiClient {
    /// # Errors
    ///
    /// Returns [`AnalysisError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        api_key: Option<&str>,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, AnalysisError> {
        Self::with_base_url(api_key, timeout_secs, user_agent, DEFAULT_BASE_URL)
    }

    /// # Errors
    ///
    /// Returns [`AnalysisError::Http`] if the client cannot be constructed, or
    /// [`AnalysisError::Validation`] if `base_url` is not a valid URL.
    pub fn with_base_url(
        api_key: Option<&str>,
        timeout_secs: u64,
        user_agent: &str,
        base_url: &str,
    ) -> Result<Self, AnalysisError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        let endpoint = Url::parse(&format!("{}/search", base_url.trim_end_matches('/')))
            .map_err(|e| {
                AnalysisError::Validation(format!("invalid SERP base URL '{base_url}': {e}"))
            })?;

        Ok(Self {
            client,
            api_key: api_key.map(str::to_owned),
            endpoint,
        })
    }
}

impl SerpProvider for SerpApiClient {
    async fn snapshot(
        &self,
        query: SerpQuery<'_>,
    ) -> Result<Option<SerpSnapshot>, AnalysisError> {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("engine", "google");
            pairs.append_pair("q", query.query);
            if let Some(key) = &self.api_key {
                pairs.append_pair("api_key", key);
            }
        }

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::UpstreamStatus {
                collaborator: COLLABORATOR,
                status: status.as_u16(),
            });
        }

        let body: SearchResponse =
            response.json().await.map_err(|e| AnalysisError::MalformedResponse {
                collaborator: COLLABORATOR,
                reason: e.to_string(),
            })?;

        if let Some(error) = body.error {
            // SerpAPI reports "no results" as an error string on a 200.
            tracing::debug!(
                query = query.query,
                error = %error,
                "SERP provider returned no results"
            );
            return Ok(None);
        }

        Ok(Some(build_snapshot(
            body.organic_results,
            body.ai_overview.as_ref(),
            query.brand,
            query.competitors,
        )))
    }
}

fn build_snapshot(
    raw: Vec<RawOrganic>,
    ai_overview: Option<&Value>,
    brand: &TrackedEntity,
    competitors: &[TrackedEntity],
) -> SerpSnapshot {
    let organic_results: Vec<OrganicResult> = raw
        .into_iter()
        .enumerate()
        .filter(|(_, r)| !r.link.is_empty())
        .map(|(idx, r)| OrganicResult {
            position: r
                .position
                .unwrap_or_else(|| u32::try_from(idx + 1).unwrap_or(u32::MAX)),
            title: r.title,
            url: r.link,
            snippet: r.snippet,
        })
        .collect();

    let position = entity_position(&organic_results, brand);
    let competitor_positions = competitors
        .iter()
        .map(|c| CompetitorPosition {
            name: c.name.clone(),
            position: entity_position(&organic_results, c),
        })
        .collect();

    SerpSnapshot {
        brand_in_results: position.is_some(),
        position,
        ai_overview: ai_overview.and_then(overview_text),
        organic_results,
        competitor_positions,
    }
}

/// Position of the first organic result on the entity's domain or naming it.
fn entity_position(results: &[OrganicResult], entity: &TrackedEntity) -> Option<u32> {
    let own_domain = entity.domain.as_deref().and_then(domain_of);
    results
        .iter()
        .find(|r| {
            let on_domain = own_domain.is_some() && domain_of(&r.url) == own_domain;
            on_domain
                || detect_mention(&r.title, &entity.name)
                || r
                    .snippet
                    .as_deref()
                    .is_some_and(|s| detect_mention(s, &entity.name))
        })
        .map(|r| r.position)
}

/// AI overviews arrive either as plain text or as `{text}` / `{text_blocks: [{snippet}]}`.
fn overview_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            if let Some(text) = map.get("text").and_then(Value::as_str) {
                text.to_string()
            } else {
                map.get("text_blocks")
                    .and_then(Value::as_array)
                    .map(|blocks| {
                        blocks
                            .iter()
                            .filter_map(|b| b.get("snippet").and_then(Value::as_str))
                            .collect::<Vec<_>>()
                            .join(" ")
                    })
                    .unwrap_or_default()
            }
        }
        _ => String::new(),
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw(position: u32, title: &str, link: &str) -> RawOrganic {
        RawOrganic {
            position: Some(position),
            title: title.to_string(),
            link: link.to_string(),
            snippet: None,
        }
    }

    #[test]
    fn brand_position_matches_domain_or_name() {
        let brand = TrackedEntity::new("Acme").with_domain("acme.com");
        let competitors = vec![TrackedEntity::new("Globex"), TrackedEntity::new("Initech")];
        let snapshot = build_snapshot(
            vec![
                raw(1, "Globex CRM review", "https://reviews.example/globex"),
                raw(2, "Pricing", "https://www.acme.com/pricing"),
            ],
            None,
            &brand,
            &competitors,
        );
        assert!(snapshot.brand_in_results);
        assert_eq!(snapshot.position, Some(2));
        assert_eq!(snapshot.competitor_positions[0].position, Some(1));
        assert_eq!(snapshot.competitor_positions[1].position, None);
    }

    #[test]
    fn overview_variants() {
        assert_eq!(overview_text(&json!("Acme leads")), Some("Acme leads".into()));
        assert_eq!(
            overview_text(&json!({"text_blocks": [{"snippet": "a"}, {"snippet": "b"}]})),
            Some("a b".into())
        );
        assert_eq!(overview_text(&json!({"text": "  "})), None);
    }
}
