//! `citations` commands: ledger verification, domain heatmap and one-off
//! claim checks.

use aivis_pipeline::{CitationSelection, Services};
use aivis_trust::Verification;
use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum CitationCommands {
    /// Verify ledger URLs against the claims they were cited for
    Verify {
        /// Maximum number of citations to check
        #[arg(long, default_value_t = 200)]
        limit: i64,

        /// Re-check already verified citations too, oldest check first
        #[arg(long)]
        all: bool,

        /// Re-check only this ledger row
        #[arg(long, conflicts_with = "all")]
        id: Option<i64>,
    },
    /// Show cited domains ranked by citation count
    Heatmap {
        /// Only count URLs cited by this engine
        #[arg(long)]
        engine: Option<String>,

        /// Show only the N most cited domains
        #[arg(long)]
        top: Option<usize>,
    },
    /// Check one claim against one URL without touching the ledger
    Check {
        #[arg(long)]
        url: String,

        #[arg(long)]
        claim: String,

        /// Page text to check instead of fetching the URL
        #[arg(long)]
        content: Option<String>,
    },
}

/// # Errors
///
/// Returns an error if citations cannot be loaded, or if `id` names a missing
/// row or one without a claim.
pub(crate) async fn run_verify(
    pool: &sqlx::PgPool,
    services: &Services,
    limit: i64,
    all: bool,
    id: Option<i64>,
) -> anyhow::Result<()> {
    if let Some(id) = id {
        let verdict = services.reverify_citation(pool, id).await?;
        print_verdict(&verdict);
        return Ok(());
    }

    let selection = if all {
        CitationSelection::All
    } else {
        CitationSelection::Pending
    };
    let summary = services
        .verify_citations(pool, selection, limit.max(1))
        .await?;
    if summary.checked == 0 && summary.skipped == 0 {
        println!("no citations to verify");
        return Ok(());
    }
    println!(
        "checked {}: {} verified, {} unverified, {} hallucinated ({} skipped, {} error(s))",
        summary.checked,
        summary.verified,
        summary.unverified,
        summary.hallucinated,
        summary.skipped,
        summary.errors
    );
    Ok(())
}

/// # Errors
///
/// Returns an error if the ledger cannot be read.
pub(crate) async fn run_heatmap(
    pool: &sqlx::PgPool,
    engine: Option<&str>,
    top: Option<usize>,
) -> anyhow::Result<()> {
    let heat = aivis_pipeline::load_heatmap(pool, engine, top).await?;
    if heat.is_empty() {
        println!("no cited domains yet; run `analyze` first");
        return Ok(());
    }

    println!(
        "{:<32}{:>10}{:>7}{:>8}{:>9}{:>9}  ENGINES",
        "DOMAIN", "CITATIONS", "URLS", "TRUST", "VERIFIED", "HALLUC."
    );
    for domain in &heat {
        println!(
            "{:<32}{:>10}{:>7}{:>8.2}{:>9}{:>9}  {}",
            truncate(&domain.domain, 31),
            domain.total_citations,
            domain.url_count,
            domain.mean_trust,
            domain.statuses.verified,
            domain.statuses.hallucinated,
            domain.engines.join(",")
        );
    }
    Ok(())
}

/// # Errors
///
/// Never fails on an unreachable page; that is reported as a hallucinated
/// verdict.
pub(crate) async fn run_check(
    services: &Services,
    url: &str,
    claim: &str,
    content: Option<&str>,
) -> anyhow::Result<()> {
    if url.trim().is_empty() || claim.trim().is_empty() {
        anyhow::bail!("--url and --claim must not be blank");
    }
    let verdict = services.verifier.verify(url.trim(), claim, content).await;
    print_verdict(&verdict);
    Ok(())
}

fn print_verdict(verdict: &Verification) {
    println!("status: {}", verdict.status.as_str());
    println!("trust:  {:.4}", verdict.trust_score);
    println!("risk:   {}", verdict.risk);
    if let Some(reason) = &verdict.failure {
        println!("reason: {reason}");
    }
}

pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let kept: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{kept}...")
    } else {
        text.to_string()
    }
}
