//! Page-content collaborator used by citation verification.

use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use sha2::{Digest, Sha256};

use crate::error::TrustError;

static SCRIPT_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|noscript)[^>]*>.*?</(script|style|noscript)>")
        .expect("valid script/style regex")
});
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").expect("valid tag regex"));
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Fetches the readable text of a page.
pub trait PageFetcher: Send + Sync {
    /// # Errors
    ///
    /// Returns [`TrustError`] when the page is unreachable, answers with a
    /// non-success status, or has no readable text.
    fn fetch_text(&self, url: &str)
        -> impl Future<Output = Result<String, TrustError>> + Send;
}

/// Strip markup from an HTML document, leaving whitespace-collapsed text.
#[must_use]
pub fn html_to_text(html: &str) -> String {
    let without_code = SCRIPT_STYLE_RE.replace_all(html, " ");
    let without_tags = TAG_RE.replace_all(&without_code, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    WS_RE.replace_all(&decoded, " ").trim().to_string()
}

/// SHA-256 of page text, hex encoded. Lets re-verification detect unchanged pages.
#[must_use]
pub fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    /// # Errors
    ///
    /// Returns [`TrustError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, TrustError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpPageFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, TrustError> {
        let parsed =
            reqwest::Url::parse(url).map_err(|_| TrustError::InvalidUrl(url.to_owned()))?;
        let response = self.client.get(parsed).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TrustError::PageStatus {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }
        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_none_or(|ct| ct.contains("html"));
        let body = response.text().await?;
        let text = if is_html {
            html_to_text(&body)
        } else {
            body.trim().to_string()
        };
        if text.is_empty() {
            return Err(TrustError::EmptyPage {
                url: url.to_owned(),
            });
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_scripts_and_entities() {
        let html = "<html><head><style>p{}</style><script>var x=1;</script></head>\
                    <body><h1>Acme&nbsp;Pricing</h1><p>Plans &amp; tiers</p></body></html>";
        assert_eq!(html_to_text(html), "Acme Pricing Plans & tiers");
    }

    #[test]
    fn hash_is_stable() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
        assert_eq!(content_hash("abc").len(), 64);
    }
}
