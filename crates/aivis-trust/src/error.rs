use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrustError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("page {url} returned HTTP {status}")]
    PageStatus { url: String, status: u16 },

    #[error("page {url} has no readable text")]
    EmptyPage { url: String },

    #[error("invalid URL '{0}'")]
    InvalidUrl(String),
}
