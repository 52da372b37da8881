//! `trust` commands.

use aivis_core::TrustWindow;
use aivis_pipeline::Services;
use chrono::{NaiveDate, Utc};
use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum TrustCommands {
    /// Recompute snapshots, trends and correlations for one day
    Recompute {
        /// Day to recompute (YYYY-MM-DD); defaults to today in UTC
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show stored authority trends
    Trends {
        #[arg(long)]
        engine: Option<String>,

        /// One of 7d, 30d, 90d
        #[arg(long)]
        window: Option<String>,
    },
    /// Show pairwise engine correlations
    Correlations,
}

/// # Errors
///
/// Returns an error on the first failed read or write.
pub(crate) async fn run_recompute(
    pool: &sqlx::PgPool,
    services: &Services,
    date: Option<NaiveDate>,
) -> anyhow::Result<()> {
    let date = date.unwrap_or_else(|| Utc::now().date_naive());
    let summary = services.recompute_trust(pool, date).await?;
    println!(
        "{}: {} snapshot(s), {} trend(s), {} correlation(s)",
        summary.date, summary.snapshots, summary.trends, summary.correlations
    );
    for category in &summary.categories {
        let delta = category
            .delta
            .map_or_else(|| "\u{2014}".to_string(), |d| format!("{d:+.2}"));
        println!(
            "  category {:<24} {:>8} {}",
            category.category, delta, category.direction
        );
    }
    Ok(())
}

pub(crate) fn parse_window(raw: Option<&str>) -> anyhow::Result<Option<TrustWindow>> {
    raw.map(str::parse::<TrustWindow>)
        .transpose()
        .map_err(|e| anyhow::anyhow!("{e}; expected one of 7d, 30d, 90d"))
}

/// # Errors
///
/// Returns an error if `window` is not a known window or the query fails.
pub(crate) async fn run_trends(
    pool: &sqlx::PgPool,
    engine: Option<&str>,
    window: Option<&str>,
) -> anyhow::Result<()> {
    let window = parse_window(window)?;
    let trends = aivis_db::list_trust_trends(pool, engine, window).await?;
    if trends.is_empty() {
        println!("no trends stored; run `trust recompute` first");
        return Ok(());
    }

    println!(
        "{:<24}{:<7}{:<12}{:>10}{:>10}{:>8}{:>9}  DIRECTION",
        "ENGINE", "WINDOW", "AS OF", "AUTHORITY", "DELTA", "VOLAT.", "OUTAGES"
    );
    for trend in &trends {
        println!(
            "{:<24}{:<7}{:<12}{:>10.3}{:>+10.3}{:>8.3}{:>9}  {}",
            trend.engine,
            trend.window.as_str(),
            trend.as_of,
            trend.current_authority,
            trend.authority_delta,
            trend.volatility,
            trend.outage_count,
            trend.direction
        );
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the query fails.
pub(crate) async fn run_correlations(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let rows = aivis_db::list_engine_correlations(pool).await?;
    if rows.is_empty() {
        println!("no correlations stored; run `trust recompute` first");
        return Ok(());
    }

    println!(
        "{:<20}{:<20}{:>7}{:>8}{:>9}{:>7}{:>7}",
        "ENGINE A", "ENGINE B", "SHARED", "CORR", "DISAGREE", "WIN A", "WIN B"
    );
    for row in &rows {
        let corr = row
            .correlation
            .map_or_else(|| "\u{2014}".to_string(), |c| format!("{c:.3}"));
        println!(
            "{:<20}{:<20}{:>7}{:>8}{:>9.3}{:>7.2}{:>7.2}",
            row.engine_a,
            row.engine_b,
            row.shared_queries,
            corr,
            row.disagreement_frequency,
            row.win_rate_a,
            row.win_rate_b
        );
    }
    Ok(())
}
