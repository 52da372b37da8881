//! Shared configuration and domain types for the AI visibility tracker.

pub mod alerts;
pub mod app_config;
pub mod citation;
pub mod config;
pub mod phase;
pub mod policy;
pub mod serp;
pub mod trust;

use thiserror::Error;

pub use alerts::{AlertKind, NotificationSettings};
pub use app_config::{AppConfig, Environment};
pub use citation::{Citation, HallucinationRisk, VerificationStatus};
pub use config::{load_app_config, load_app_config_from_env};
pub use phase::{JobPhase, Sentiment};
pub use policy::{
    load_tracking_policy, parse_tracking_policy, RiskCutPoints, ScoringWeights, TrackingPolicy,
    TrendPolicy, VerifierThresholds,
};
pub use serp::{CompetitorPosition, OrganicResult, SerpSnapshot};
pub use trust::{EngineCorrelation, TrendDirection, TrustSnapshot, TrustTrend, TrustWindow};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read tracking policy {path}: {source}")]
    PolicyFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse tracking policy: {0}")]
    PolicyFileParse(#[from] serde_yaml::Error),

    #[error("tracking policy validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("unknown {kind} value: '{value}'")]
    UnknownValue { kind: &'static str, value: String },

    #[error("invalid job phase transition {from} -> {to}")]
    InvalidTransition { from: JobPhase, to: JobPhase },
}
