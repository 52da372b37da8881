mod analyze;
mod citations;
mod trust;

use aivis_core::AppConfig;
use aivis_pipeline::Services;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::analyze::AnalyzeArgs;
use crate::citations::CitationCommands;
use crate::trust::TrustCommands;

#[derive(Debug, Parser)]
#[command(name = "aivis-cli")]
#[command(about = "AI visibility tracking command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Run analysis jobs for tracked prompts
    Analyze(AnalyzeArgs),
    /// Verify cited URLs and inspect the citation ledger
    Citations {
        #[command(subcommand)]
        command: CitationCommands,
    },
    /// Recompute and inspect engine trust metrics
    Trust {
        #[command(subcommand)]
        command: TrustCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("aivis-cli ready; run with --help to list commands");
        return Ok(());
    };

    let config = aivis_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match command {
        Commands::Db { command } => run_db(&connect(&config).await?, command).await,
        Commands::Analyze(args) => {
            let services = build_services(&config)?;
            analyze::run_analyze(&connect(&config).await?, &services, &args).await
        }
        Commands::Citations { command } => match command {
            CitationCommands::Verify { limit, all, id } => {
                let services = build_services(&config)?;
                let pool = connect(&config).await?;
                citations::run_verify(&pool, &services, limit, all, id).await
            }
            CitationCommands::Heatmap { engine, top } => {
                citations::run_heatmap(&connect(&config).await?, engine.as_deref(), top).await
            }
            // Ad-hoc checks never touch the database.
            CitationCommands::Check {
                url,
                claim,
                content,
            } => {
                let services = build_services(&config)?;
                citations::run_check(&services, &url, &claim, content.as_deref()).await
            }
        },
        Commands::Trust { command } => match command {
            TrustCommands::Recompute { date } => {
                let services = build_services(&config)?;
                trust::run_recompute(&connect(&config).await?, &services, date).await
            }
            TrustCommands::Trends { engine, window } => {
                let pool = connect(&config).await?;
                trust::run_trends(&pool, engine.as_deref(), window.as_deref()).await
            }
            TrustCommands::Correlations => {
                trust::run_correlations(&connect(&config).await?).await
            }
        },
    }
}

async fn connect(config: &AppConfig) -> anyhow::Result<sqlx::PgPool> {
    let pool_config = aivis_db::PoolConfig::from_app_config(config);
    let pool = aivis_db::connect_pool(&config.database_url, pool_config).await?;
    Ok(pool)
}

fn build_services(config: &AppConfig) -> anyhow::Result<Services> {
    let policy = aivis_core::load_tracking_policy(&config.tracking_path)?;
    tracing::debug!(
        models = ?policy.models,
        personas = ?policy.personas,
        "tracking policy loaded"
    );
    Ok(Services::from_config(config, policy)?)
}

async fn run_db(pool: &sqlx::PgPool, command: DbCommands) -> anyhow::Result<()> {
    match command {
        DbCommands::Ping => {
            aivis_db::health_check(pool).await?;
            println!("database reachable");
        }
        DbCommands::Migrate => {
            let applied = aivis_db::run_migrations(pool).await?;
            println!("applied {applied} migration(s)");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;
