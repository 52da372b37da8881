//! Citation verification, trust aggregation, and the citation heatmap.
//!
//! Everything here except [`page::HttpPageFetcher`] is a pure function of its
//! inputs, so recomputing a derived row from unchanged history reproduces it
//! exactly.

pub mod category;
pub mod correlation;
pub mod domain;
pub mod error;
pub mod heatmap;
pub mod page;
pub mod similarity;
pub mod snapshot;
pub mod stats;
pub mod trends;
pub mod verifier;

pub use category::{compute_category_trends, CategoryTrend, CategoryVisibility};
pub use correlation::{compute_engine_correlations, EngineQueryOutcome};
pub use domain::domain_of;
pub use error::TrustError;
pub use heatmap::{
    build_heatmap, domains_for_engine, top_domains, DomainHeat, LedgerEntry, StatusBreakdown,
};
pub use page::{content_hash, html_to_text, HttpPageFetcher, PageFetcher};
pub use similarity::{LexicalOverlap, SimilarityScorer};
pub use snapshot::{compute_trust_snapshot, EngineDayObservations};
pub use trends::calculate_trust_trends;
pub use verifier::{hallucination_risk, verify_citation, CitationVerifier, Verification};
