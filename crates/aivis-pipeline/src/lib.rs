//! Glue between the analysis and trust engines and Postgres.
//!
//! Everything here takes an explicit pool handle; the binaries decide when
//! each entry point runs.

pub mod analysis;
pub mod error;
pub mod heatmap;
pub mod recorder;
pub mod services;
pub mod trust;
pub mod verify;

pub use analysis::{
    build_requests, current_state, plan_cycle, previous_states, Analyzer, CycleSummary,
};
pub use error::PipelineError;
pub use heatmap::{ledger_entry, load_heatmap};
pub use recorder::PgJobRecorder;
pub use services::{Engine, Services, Verifier};
pub use trust::{recompute_trust, TrustRecomputeSummary};
pub use verify::{reverify_citation, verify_citations, CitationSelection, VerifySummary};
