//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring analysis, citation verification and trust jobs.

use std::sync::Arc;

use aivis_core::AppConfig;
use aivis_pipeline::{CitationSelection, Services};
use chrono::Utc;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Pending citations checked per verification run.
const VERIFY_BATCH: i64 = 200;

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process; dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    services: Arc<Services>,
    config: Arc<AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    let pool = Arc::new(pool);

    register_analysis_job(
        &scheduler,
        &config.analysis_cron,
        Arc::clone(&pool),
        Arc::clone(&services),
    )
    .await?;
    register_verify_job(
        &scheduler,
        &config.verify_cron,
        Arc::clone(&pool),
        Arc::clone(&services),
    )
    .await?;
    register_trust_job(&scheduler, &config.trust_cron, pool, services).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Analyze every active prompt against every tracked model and persona.
async fn register_analysis_job(
    scheduler: &JobScheduler,
    cron: &str,
    pool: Arc<PgPool>,
    services: Arc<Services>,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let services = Arc::clone(&services);

        Box::pin(async move {
            tracing::info!("scheduler: starting analysis cycle");
            match services.analyzer(&pool).run_analysis_cycle().await {
                Ok(summary) => tracing::info!(
                    prompts = summary.prompts,
                    complete = summary.jobs_complete,
                    failed = summary.jobs_failed,
                    errors = summary.errors,
                    alerts = summary.alerts_raised,
                    "scheduler: analysis cycle complete"
                ),
                Err(e) => tracing::error!(error = %e, "scheduler: analysis cycle failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron, "scheduler: registered analysis job");
    Ok(())
}

/// Verify a batch of pending ledger citations.
async fn register_verify_job(
    scheduler: &JobScheduler,
    cron: &str,
    pool: Arc<PgPool>,
    services: Arc<Services>,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let services = Arc::clone(&services);

        Box::pin(async move {
            match services
                .verify_citations(&pool, CitationSelection::Pending, VERIFY_BATCH)
                .await
            {
                Ok(summary) if summary.checked == 0 => {
                    tracing::debug!("scheduler: no pending citations");
                }
                Ok(summary) => tracing::info!(
                    checked = summary.checked,
                    verified = summary.verified,
                    unverified = summary.unverified,
                    hallucinated = summary.hallucinated,
                    skipped = summary.skipped,
                    errors = summary.errors,
                    "scheduler: citation verification complete"
                ),
                Err(e) => {
                    tracing::error!(error = %e, "scheduler: citation verification failed");
                }
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron, "scheduler: registered citation verification job");
    Ok(())
}

/// Recompute today's trust snapshots, trends and correlations.
async fn register_trust_job(
    scheduler: &JobScheduler,
    cron: &str,
    pool: Arc<PgPool>,
    services: Arc<Services>,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let services = Arc::clone(&services);

        Box::pin(async move {
            let date = Utc::now().date_naive();
            if let Err(e) = services.recompute_trust(&pool, date).await {
                tracing::error!(%date, error = %e, "scheduler: trust recomputation failed");
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron, "scheduler: registered trust recomputation job");
    Ok(())
}
