//! Analysis cycle: expand tracked prompts into jobs, run them with bounded
//! concurrency, then evaluate and deliver alerts for each completed job.

use std::collections::HashMap;

use aivis_analysis::{
    dispatch_alerts, evaluate_alerts, AlertContext, AnalysisJob, AnsweringEngine,
    CompetitorStanding, JobEngine, JobRequest, Judgement, LogNotifier, Notifier, ScoreState,
    SerpProvider, TrackedEntity,
};
use aivis_core::{JobPhase, TrackingPolicy};
use aivis_db::{ChangeFeed, ChangeOp, EntityKind, NewAlertEvent, PromptResultRow, PromptTarget};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde::Serialize;
use sqlx::PgPool;

use crate::error::PipelineError;
use crate::recorder::PgJobRecorder;

/// Recent results scanned for each model and persona's previous score state.
const HISTORY_LOOKBACK: i64 = 50;

#[derive(Debug, Default, Serialize)]
pub struct CycleSummary {
    pub prompts: usize,
    pub jobs_complete: usize,
    pub jobs_failed: usize,
    /// Jobs or prompts that could not be run or persisted.
    pub errors: usize,
    pub alerts_raised: usize,
    pub jobs: Vec<AnalysisJob>,
}

impl CycleSummary {
    fn absorb(&mut self, outcome: JobOutcome) {
        if outcome.job.phase == JobPhase::Complete {
            self.jobs_complete += 1;
        } else {
            self.jobs_failed += 1;
        }
        self.alerts_raised += outcome.alerts;
        self.jobs.push(outcome.job);
    }
}

struct JobOutcome {
    job: AnalysisJob,
    alerts: usize,
}

/// One job request per configured model and persona.
#[must_use]
pub fn build_requests(target: &PromptTarget, policy: &TrackingPolicy) -> Vec<JobRequest> {
    let brand = entity(&target.brand_name, target.brand_domain.as_deref());
    let competitors: Vec<TrackedEntity> = target
        .competitors
        .0
        .iter()
        .map(|c| entity(&c.name, c.domain.as_deref()))
        .collect();

    policy
        .models
        .iter()
        .flat_map(|model| {
            policy.personas.iter().map(|persona| JobRequest {
                prompt_id: target.prompt_id,
                prompt_text: target.prompt_text.clone(),
                brand: brand.clone(),
                competitors: competitors.clone(),
                model: model.clone(),
                persona: persona.clone(),
            })
        })
        .collect()
}

fn entity(name: &str, domain: Option<&str>) -> TrackedEntity {
    let entity = TrackedEntity::new(name);
    match domain {
        Some(d) => entity.with_domain(d),
        None => entity,
    }
}

/// Latest score state per `(model, persona)` from results ordered newest
/// first. Each persona is compared only against its own earlier runs.
#[must_use]
pub fn previous_states(rows: &[PromptResultRow]) -> HashMap<(String, String), ScoreState> {
    let mut states = HashMap::new();
    for row in rows {
        let key = (row.model.clone(), row.persona.clone());
        if states.contains_key(&key) {
            continue;
        }
        let standings: Vec<CompetitorStanding> =
            match serde_json::from_value(row.competitors.clone()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(
                        result_id = row.id,
                        error = %e,
                        "stored competitor standings unreadable, ignoring"
                    );
                    Vec::new()
                }
            };
        states.insert(
            key,
            ScoreState {
                own_score: aivis_db::from_decimal(row.visibility_score),
                competitor_scores: standings
                    .into_iter()
                    .map(|s| (s.name, s.visibility_score))
                    .collect(),
            },
        );
    }
    states
}

#[must_use]
pub fn current_state(judgement: &Judgement) -> ScoreState {
    ScoreState {
        own_score: judgement.visibility_score,
        competitor_scores: judgement
            .competitors
            .iter()
            .map(|c| (c.name.clone(), c.visibility_score))
            .collect(),
    }
}

/// Every request the next cycle would submit, without running anything.
///
/// # Errors
///
/// Returns [`PipelineError::Db`] if the tracked prompts cannot be loaded.
pub async fn plan_cycle(
    pool: &PgPool,
    policy: &TrackingPolicy,
) -> Result<Vec<JobRequest>, PipelineError> {
    let targets = aivis_db::list_prompt_targets(pool).await?;
    Ok(targets
        .iter()
        .flat_map(|t| build_requests(t, policy))
        .collect())
}

/// Runs analysis jobs against Postgres.
pub struct Analyzer<'a, A, S, N> {
    pool: &'a PgPool,
    engine: &'a JobEngine<A, S>,
    notifier: &'a N,
    policy: &'a TrackingPolicy,
    max_concurrent: usize,
    feed: Option<&'a ChangeFeed>,
}

impl<'a, A, S, N> Analyzer<'a, A, S, N>
where
    A: AnsweringEngine,
    S: SerpProvider,
    N: Notifier,
{
    #[must_use]
    pub fn new(
        pool: &'a PgPool,
        engine: &'a JobEngine<A, S>,
        notifier: &'a N,
        policy: &'a TrackingPolicy,
        max_concurrent: usize,
    ) -> Self {
        Self {
            pool,
            engine,
            notifier,
            policy,
            max_concurrent,
            feed: None,
        }
    }

    #[must_use]
    pub fn with_feed(mut self, feed: &'a ChangeFeed) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Analyze one prompt with every configured model and persona.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::PromptNotFound`] if the prompt does not exist.
    /// - [`PipelineError::Analysis`] with a validation error, before any job
    ///   row is written, if the prompt or its brand is incomplete.
    /// - [`PipelineError::Db`] if history cannot be read.
    ///
    /// Individual job failures are reported in the summary, not as errors.
    pub async fn analyze_prompt(&self, prompt_id: i64) -> Result<CycleSummary, PipelineError> {
        let target = aivis_db::get_prompt_target(self.pool, prompt_id)
            .await?
            .ok_or(PipelineError::PromptNotFound(prompt_id))?;
        let requests = build_requests(&target, self.policy);
        for request in &requests {
            request.validate()?;
        }
        let units = self.prepare(&target, requests).await?;
        let mut summary = self.run_units(units).await;
        summary.prompts = 1;
        Ok(summary)
    }

    /// Analyze every active prompt. A prompt or job that fails is logged and
    /// counted; the rest of the cycle continues.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Db`] only if the prompt list cannot be loaded.
    pub async fn run_analysis_cycle(&self) -> Result<CycleSummary, PipelineError> {
        let targets = aivis_db::list_prompt_targets(self.pool).await?;
        let mut units = Vec::new();
        let mut prep_errors = 0;
        for target in &targets {
            let requests = build_requests(target, self.policy);
            match self.prepare(target, requests).await {
                Ok(mut prepared) => units.append(&mut prepared),
                Err(e) => {
                    tracing::error!(
                        prompt_id = target.prompt_id,
                        error = %e,
                        "could not prepare prompt for analysis"
                    );
                    prep_errors += 1;
                }
            }
        }

        let mut summary = self.run_units(units).await;
        summary.prompts = targets.len();
        summary.errors += prep_errors;

        if summary.errors > 0 {
            tracing::warn!(
                errors = summary.errors,
                prompts = summary.prompts,
                "analysis cycle finished with errors"
            );
        }
        tracing::info!(
            prompts = summary.prompts,
            complete = summary.jobs_complete,
            failed = summary.jobs_failed,
            alerts = summary.alerts_raised,
            "analysis cycle complete"
        );
        Ok(summary)
    }

    async fn prepare<'t>(
        &self,
        target: &'t PromptTarget,
        requests: Vec<JobRequest>,
    ) -> Result<Vec<Unit<'t>>, PipelineError> {
        let history =
            aivis_db::list_results_for_prompt(self.pool, target.prompt_id, HISTORY_LOOKBACK)
                .await?;
        let previous = previous_states(&history);
        Ok(requests
            .into_iter()
            .map(|request| Unit {
                previous: previous
                    .get(&(request.model.clone(), request.persona.clone()))
                    .cloned(),
                target,
                request,
            })
            .collect())
    }

    async fn run_units<'t>(&self, units: Vec<Unit<'t>>) -> CycleSummary {
        let results: Vec<(Unit<'t>, Result<JobOutcome, PipelineError>)> = stream::iter(units)
            .map(|unit: Unit<'t>| {
                async move {
                    let result = self.run_unit(&unit).await;
                    (unit, result)
                }
                .boxed()
            })
            .boxed()
            .buffer_unordered(self.max_concurrent.max(1))
            .collect()
            .await;

        let mut summary = CycleSummary::default();
        for (unit, result) in results {
            match result {
                Ok(outcome) => summary.absorb(outcome),
                Err(e) => {
                    tracing::error!(
                        prompt_id = unit.target.prompt_id,
                        model = %unit.request.model,
                        persona = %unit.request.persona,
                        error = %e,
                        "analysis job could not be run"
                    );
                    summary.errors += 1;
                }
            }
        }
        summary
    }

    async fn run_unit(&self, unit: &Unit<'_>) -> Result<JobOutcome, PipelineError> {
        let recorder = PgJobRecorder::new(self.pool).with_feed(self.feed, unit.target.owner_id);
        let report = self.engine.submit_job(&unit.request, &recorder).await?;

        let mut alerts = 0;
        if let (Some(judgement), Some(previous)) = (&report.judgement, &unit.previous) {
            let current = current_state(judgement);
            match self
                .evaluate_and_notify(unit.target, &report.job, previous, &current)
                .await
            {
                Ok(n) => alerts = n,
                Err(e) => tracing::error!(
                    prompt_id = unit.target.prompt_id,
                    model = %unit.request.model,
                    persona = %unit.request.persona,
                    error = %e,
                    "alert evaluation failed"
                ),
            }
        }
        Ok(JobOutcome {
            job: report.job,
            alerts,
        })
    }

    /// Evaluate alerts for the score change produced by `job`, log each new
    /// alert event once, and deliver the new ones. Returns how many new alerts
    /// were raised. Evaluating the same job again raises nothing.
    ///
    /// Every alert goes to the log sink; the configured notifier is used only
    /// when the owner has delivery enabled.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if settings cannot be read or an event cannot
    /// be logged. Delivery failures are logged, not returned.
    pub async fn evaluate_and_notify(
        &self,
        target: &PromptTarget,
        job: &AnalysisJob,
        previous: &ScoreState,
        current: &ScoreState,
    ) -> Result<usize, PipelineError> {
        let settings = aivis_db::get_notification_settings(self.pool, target.owner_id).await?;
        let context = AlertContext {
            prompt_id: target.prompt_id,
            prompt_text: target.prompt_text.clone(),
            brand: target.brand_name.clone(),
            model: job.model.clone(),
            persona: job.persona.clone(),
            job_id: job.id,
        };
        let events = evaluate_alerts(previous, current, &settings, &context);
        if events.is_empty() {
            return Ok(0);
        }

        let mut fresh = Vec::with_capacity(events.len());
        for event in events {
            let dedupe_key = event.dedupe_key();
            let message = event.message();
            let payload = serde_json::to_value(&event)?;
            let logged = aivis_db::record_alert_event(
                self.pool,
                &NewAlertEvent {
                    owner_id: target.owner_id,
                    prompt_id: target.prompt_id,
                    kind: event.kind,
                    dedupe_key: &dedupe_key,
                    competitor: event.competitor.as_deref(),
                    previous_score: event.previous_score,
                    current_score: event.current_score,
                    message: &message,
                    payload: payload.clone(),
                },
            )
            .await?;
            match logged {
                Some(id) => {
                    if let Some(feed) = self.feed {
                        feed.publish(
                            Some(target.owner_id),
                            EntityKind::AlertEvent,
                            id.to_string(),
                            ChangeOp::Upsert,
                            payload,
                        );
                    }
                    fresh.push(event);
                }
                None => tracing::debug!(
                    prompt_id = target.prompt_id,
                    kind = %event.kind,
                    "alert already raised, suppressing"
                ),
            }
        }

        dispatch_alerts(&LogNotifier, &fresh).await;
        if settings.email_enabled && !fresh.is_empty() {
            let delivered = dispatch_alerts(self.notifier, &fresh).await;
            tracing::debug!(
                prompt_id = target.prompt_id,
                delivered,
                raised = fresh.len(),
                "alerts delivered"
            );
        }
        Ok(fresh.len())
    }
}

struct Unit<'t> {
    target: &'t PromptTarget,
    request: JobRequest,
    previous: Option<ScoreState>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use aivis_db::CompetitorEntry;
    use chrono::Utc;
    use serde_json::json;
    use sqlx::types::Json;
    use uuid::Uuid;

    fn target() -> PromptTarget {
        PromptTarget {
            prompt_id: 9,
            prompt_text: "best crm for startups".to_string(),
            category: Some("crm".to_string()),
            visibility_score: None,
            brand_id: 1,
            owner_id: Uuid::new_v4(),
            brand_name: "Acme".to_string(),
            brand_domain: Some("acme.com".to_string()),
            competitors: Json(vec![CompetitorEntry {
                name: "Globex".to_string(),
                domain: None,
            }]),
        }
    }

    fn result_row(
        id: i64,
        model: &str,
        persona: &str,
        score: f64,
        competitors: serde_json::Value,
    ) -> PromptResultRow {
        PromptResultRow {
            id,
            prompt_id: 9,
            job_id: None,
            model: model.to_string(),
            persona: persona.to_string(),
            brand_mentioned: true,
            sentiment: None,
            rank: None,
            visibility_score: aivis_db::to_decimal(score, 2),
            response_snippet: None,
            citations: Json(Vec::new()),
            competitors,
            recommendations: Json(Vec::new()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn requests_cover_models_times_personas() {
        let policy = TrackingPolicy {
            models: vec!["gpt-4o".to_string(), "claude".to_string()],
            personas: vec!["default".to_string(), "cto".to_string()],
            ..TrackingPolicy::default()
        };
        let requests = build_requests(&target(), &policy);
        assert_eq!(requests.len(), 4);
        assert!(requests.iter().all(|r| r.prompt_id == 9));
        assert_eq!(requests[0].brand.domain.as_deref(), Some("acme.com"));
        assert_eq!(requests[0].competitors[0].name, "Globex");
        let pairs: Vec<_> = requests
            .iter()
            .map(|r| (r.model.as_str(), r.persona.as_str()))
            .collect();
        assert!(pairs.contains(&("claude", "cto")));
    }

    fn key(model: &str, persona: &str) -> (String, String) {
        (model.to_string(), persona.to_string())
    }

    #[test]
    fn previous_state_takes_newest_row_per_model() {
        let rows = vec![
            result_row(
                3,
                "gpt-4o",
                "default",
                65.0,
                json!([{"name": "Globex", "mentioned": true, "rank": 1,
                        "sentiment": null, "visibility_score": 75.0}]),
            ),
            result_row(2, "claude", "default", 40.0, json!([])),
            result_row(1, "gpt-4o", "default", 80.0, json!([])),
        ];
        let states = previous_states(&rows);
        assert_eq!(states.len(), 2);
        let gpt = &states[&key("gpt-4o", "default")];
        assert!((gpt.own_score - 65.0).abs() < 1e-9);
        assert_eq!(gpt.competitor_scores.get("Globex"), Some(&75.0));
        assert!((states[&key("claude", "default")].own_score - 40.0).abs() < 1e-9);
    }

    #[test]
    fn personas_keep_separate_previous_states() {
        // The default persona ran last with a high score; the skeptical
        // persona has stayed low and must not be compared against it.
        let rows = vec![
            result_row(4, "gpt-4o", "default", 74.0, json!([])),
            result_row(3, "gpt-4o", "skeptical-buyer", 40.0, json!([])),
            result_row(2, "gpt-4o", "default", 74.0, json!([])),
        ];
        let states = previous_states(&rows);
        let skeptic = &states[&key("gpt-4o", "skeptical-buyer")];
        assert!((skeptic.own_score - 40.0).abs() < 1e-9);

        let settings = aivis_core::NotificationSettings::default();
        let context = AlertContext {
            prompt_id: 9,
            prompt_text: "best crm for startups".to_string(),
            brand: "Acme".to_string(),
            model: "gpt-4o".to_string(),
            persona: "skeptical-buyer".to_string(),
            job_id: Some(5),
        };
        let current = ScoreState {
            own_score: 40.0,
            ..ScoreState::default()
        };
        assert!(evaluate_alerts(skeptic, &current, &settings, &context).is_empty());
    }

    #[test]
    fn unreadable_standings_are_ignored() {
        let rows = vec![result_row(1, "gpt-4o", "default", 50.0, json!({"not": "a list"}))];
        let states = previous_states(&rows);
        assert!(states[&key("gpt-4o", "default")].competitor_scores.is_empty());
    }

    #[test]
    fn current_state_maps_competitor_scores() {
        let judgement = Judgement {
            brand_mentioned: true,
            mention_count: 2,
            rank: Some(2),
            sentiment: None,
            sentiment_score: 0.0,
            citations: Vec::new(),
            competitors: vec![CompetitorStanding {
                name: "Globex".to_string(),
                mentioned: true,
                rank: Some(1),
                sentiment: None,
                visibility_score: 81.0,
            }],
            visibility_score: 62.5,
            confidence: 0.75,
            recommendations: Vec::new(),
            reasoning: String::new(),
            snippet: String::new(),
        };
        let state = current_state(&judgement);
        assert!((state.own_score - 62.5).abs() < 1e-9);
        assert_eq!(state.competitor_scores.get("Globex"), Some(&81.0));
    }
}
