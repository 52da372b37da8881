use aivis_core::AppConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/aivis-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,
    #[error("stored value for {column} is invalid: {reason}")]
    InvalidValue { column: &'static str, reason: String },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// The pool is meant to be opened once by the binary and passed down by
/// reference; nothing in this crate holds a global handle.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    // _sqlx_migrations does not exist on a fresh database; treat that as zero applied.
    let applied_before: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    MIGRATOR.run(pool).await?;

    let applied_after: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Ping the pool and return a typed error on failure.
///
/// # Errors
///
/// Returns [`DbError`] if the ping fails.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    ping(pool).await?;
    Ok(())
}

pub mod alert_events;
pub mod brands;
pub mod change_feed;
pub mod citations;
pub mod completion;
mod decimal;
pub mod history;
pub mod jobs;
pub mod notifications;
pub mod prompts;
pub mod results;
pub mod trust;

pub use alert_events::{list_alert_events, record_alert_event, AlertEventRow, NewAlertEvent};
pub use brands::{create_brand, get_brand, BrandRow, CompetitorEntry};
pub use change_feed::{ChangeEvent, ChangeFeed, ChangeOp, EntityKind, LocalView, Subscription};
pub use citations::{
    get_citation, get_citation_by_url, list_citation_ledger, list_citations_for_reverification,
    list_pending_citations, record_citation, record_verification, UrlCitationRow,
    VerificationUpdate,
};
pub use completion::{record_job_completion, CitationSighting, CompletionIds, JobCompletion};
pub use decimal::{from_decimal, to_decimal};
pub use history::{
    insert_serp_history, insert_visibility_history, list_category_visibility,
    list_serp_history, list_visibility_history, CategoryVisibilityRow, SerpHistoryRow,
    VisibilityHistoryRow,
};
pub use jobs::{get_job, insert_job, list_jobs_for_prompt, update_job_state, JobRow, JobState};
pub use notifications::{get_notification_settings, upsert_notification_settings};
pub use prompts::{
    create_prompt, delete_prompt, get_prompt, get_prompt_target, list_prompt_targets,
    update_prompt_score, NewPrompt, PromptRow, PromptTarget,
};
pub use results::{insert_prompt_result, list_results_for_prompt, NewPromptResult, PromptResultRow};
pub use trust::{
    engine_day_counts, engine_day_trust_scores, engine_query_outcomes, list_engine_correlations,
    list_trust_engines, list_trust_snapshots, list_trust_trends, upsert_engine_correlation,
    upsert_trust_snapshot, upsert_trust_trend, EngineDayCountsRow, EngineQueryOutcomeRow,
};
