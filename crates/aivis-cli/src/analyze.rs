//! `analyze` command: run analysis jobs now instead of waiting for the
//! scheduler.

use aivis_pipeline::{CycleSummary, Services};
use clap::Args;

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Analyze a single prompt instead of every active prompt
    #[arg(long)]
    pub prompt_id: Option<i64>,

    /// List the jobs that would be submitted without calling any engine
    #[arg(long)]
    pub dry_run: bool,
}

/// # Errors
///
/// Returns an error if prompts cannot be loaded, the requested prompt does
/// not exist, or a request fails validation. Individual job failures are
/// reported in the summary, not returned.
pub(crate) async fn run_analyze(
    pool: &sqlx::PgPool,
    services: &Services,
    args: &AnalyzeArgs,
) -> anyhow::Result<()> {
    if args.dry_run {
        let mut plan = aivis_pipeline::plan_cycle(pool, &services.policy).await?;
        if let Some(id) = args.prompt_id {
            plan.retain(|r| r.prompt_id == id);
        }
        if plan.is_empty() {
            println!("[dry-run] nothing to analyze");
            return Ok(());
        }
        println!("[dry-run] {} job(s) would be submitted:", plan.len());
        for request in &plan {
            println!(
                "  prompt {:<6} {:<24} {:<16} brand={}",
                request.prompt_id, request.model, request.persona, request.brand.name
            );
        }
        return Ok(());
    }

    let analyzer = services.analyzer(pool);
    let summary = match args.prompt_id {
        Some(id) => analyzer.analyze_prompt(id).await?,
        None => analyzer.run_analysis_cycle().await?,
    };
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &CycleSummary) {
    println!(
        "analyzed {} prompt(s): {} complete, {} failed, {} error(s), {} alert(s)",
        summary.prompts,
        summary.jobs_complete,
        summary.jobs_failed,
        summary.errors,
        summary.alerts_raised
    );
    if summary.jobs.is_empty() {
        return;
    }
    println!();
    println!(
        "{:<8}{:<24}{:<16}{:<10}{:<10}SCORE",
        "PROMPT", "MODEL", "PERSONA", "PHASE", "MENTION"
    );
    for job in &summary.jobs {
        let score = job
            .visibility_score
            .map_or_else(|| "\u{2014}".to_string(), |s| format!("{s:.1}"));
        println!(
            "{:<8}{:<24}{:<16}{:<10}{:<10}{}",
            job.prompt_id,
            job.model,
            job.persona,
            job.phase.as_str(),
            if job.brand_mentioned { "yes" } else { "no" },
            score
        );
    }
}
