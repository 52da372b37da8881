use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use aivis_core::{JobPhase, ScoringWeights, SerpSnapshot};

use super::*;
use crate::job::TrackedEntity;

enum Reply {
    Text(&'static str),
    Status(u16),
    Hang,
}

struct FakeAnswerer {
    replies: Mutex<Vec<Reply>>,
    calls: AtomicU32,
    seen_context: Mutex<Option<String>>,
}

impl FakeAnswerer {
    fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies),
            calls: AtomicU32::new(0),
            seen_context: Mutex::new(None),
        }
    }
}

impl AnsweringEngine for FakeAnswerer {
    async fn answer(&self, request: AnswerRequest<'_>) -> Result<String, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen_context.lock().unwrap() = request.context.map(str::to_string);
        let reply = {
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                replies.remove(0)
            } else {
                match replies.first() {
                    Some(Reply::Text(t)) => Reply::Text(*t),
                    Some(Reply::Status(s)) => Reply::Status(*s),
                    Some(Reply::Hang) | None => Reply::Hang,
                }
            }
        };
        match reply {
            Reply::Text(text) => Ok(text.to_string()),
            Reply::Status(status) => Err(AnalysisError::UpstreamStatus {
                collaborator: "answering engine",
                status,
            }),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok("too late".to_string())
            }
        }
    }
}

struct FakeSerp(Result<Option<SerpSnapshot>, u16>);

impl SerpProvider for FakeSerp {
    async fn snapshot(
        &self,
        _query: SerpQuery<'_>,
    ) -> Result<Option<SerpSnapshot>, AnalysisError> {
        match &self.0 {
            Ok(snapshot) => Ok(snapshot.clone()),
            Err(status) => Err(AnalysisError::UpstreamStatus {
                collaborator: "serp provider",
                status: *status,
            }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("store unavailable")]
struct StoreDown;

#[derive(Default)]
struct MemoryRecorder {
    phases: Mutex<Vec<JobPhase>>,
    completed_at_seen: Mutex<Vec<bool>>,
    serp_rows: AtomicU32,
    completions: AtomicU32,
    fail_create: bool,
}

impl MemoryRecorder {
    fn observe(&self, job: &AnalysisJob) {
        self.phases.lock().unwrap().push(job.phase);
        self.completed_at_seen
            .lock()
            .unwrap()
            .push(job.completed_at.is_some());
    }

    fn phases(&self) -> Vec<JobPhase> {
        self.phases.lock().unwrap().clone()
    }
}

impl JobRecorder for MemoryRecorder {
    type Error = StoreDown;

    async fn create_job(&self, job: &AnalysisJob) -> Result<i64, StoreDown> {
        if self.fail_create {
            return Err(StoreDown);
        }
        self.observe(job);
        Ok(42)
    }

    async fn record_phase(&self, job: &AnalysisJob) -> Result<(), StoreDown> {
        self.observe(job);
        Ok(())
    }

    async fn record_serp(
        &self,
        _job: &AnalysisJob,
        _snapshot: &SerpSnapshot,
    ) -> Result<(), StoreDown> {
        self.serp_rows.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn record_completion(
        &self,
        job: &AnalysisJob,
        _judgement: &Judgement,
    ) -> Result<(), StoreDown> {
        self.observe(job);
        self.completions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn request() -> JobRequest {
    JobRequest {
        prompt_id: 7,
        prompt_text: "What is the best CRM for startups?".to_string(),
        brand: TrackedEntity::new("Acme"),
        competitors: vec![TrackedEntity::new("Globex")],
        model: "gpt-4o".to_string(),
        persona: "default".to_string(),
    }
}

fn settings() -> EngineSettings {
    EngineSettings {
        upstream_timeout: Duration::from_millis(50),
        max_retries: 1,
        backoff_base_ms: 0,
        scoring: ScoringWeights::default(),
    }
}

fn snapshot() -> SerpSnapshot {
    SerpSnapshot {
        brand_in_results: true,
        position: Some(3),
        ai_overview: Some("Acme and Globex are common choices".to_string()),
        organic_results: vec![],
        competitor_positions: vec![],
    }
}

fn assert_completed_at_invariant(recorder: &MemoryRecorder) {
    let phases = recorder.phases();
    let stamps = recorder.completed_at_seen.lock().unwrap().clone();
    for (phase, stamped) in phases.iter().zip(stamps) {
        assert_eq!(phase.is_terminal(), stamped, "completed_at mismatch in {phase}");
    }
}

#[tokio::test]
async fn happy_path_records_every_phase_in_order() {
    let engine = JobEngine::new(
        FakeAnswerer::new(vec![Reply::Text(
            "Acme is the best CRM for startups. Globex is also popular.",
        )]),
        FakeSerp(Ok(Some(snapshot()))),
        settings(),
    );
    let recorder = MemoryRecorder::default();

    let report = engine.submit_job(&request(), &recorder).await.unwrap();

    assert_eq!(report.job.phase, JobPhase::Complete);
    assert_eq!(report.job.id, Some(42));
    assert_eq!(recorder.phases(), JobPhase::SEQUENCE.to_vec());
    assert_eq!(report.job.phase_history(), &JobPhase::SEQUENCE);
    assert_completed_at_invariant(&recorder);
    assert_eq!(recorder.serp_rows.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.completions.load(Ordering::SeqCst), 1);

    let judgement = report.judgement.unwrap();
    assert!(judgement.brand_mentioned);
    assert_eq!(judgement.rank, Some(1));
    assert_eq!(report.job.visibility_score, Some(judgement.visibility_score));
    assert!(engine
        .answerer
        .seen_context
        .lock()
        .unwrap()
        .as_deref()
        .is_some_and(|c| c.contains("Acme and Globex")));
}

#[tokio::test]
async fn missing_serp_is_not_fatal() {
    let engine = JobEngine::new(
        FakeAnswerer::new(vec![Reply::Text("Acme works well.")]),
        FakeSerp(Err(503)),
        settings(),
    );
    let recorder = MemoryRecorder::default();

    let report = engine.submit_job(&request(), &recorder).await.unwrap();

    assert_eq!(report.job.phase, JobPhase::Complete);
    assert_eq!(recorder.serp_rows.load(Ordering::SeqCst), 0);
    assert!(engine.answerer.seen_context.lock().unwrap().is_none());
}

#[tokio::test]
async fn unconfigured_serp_provider_is_skipped() {
    let engine = JobEngine::new(
        FakeAnswerer::new(vec![Reply::Text("Acme works well.")]),
        None::<FakeSerp>,
        settings(),
    );
    let recorder = MemoryRecorder::default();
    let report = engine.submit_job(&request(), &recorder).await.unwrap();
    assert_eq!(report.job.phase, JobPhase::Complete);
}

#[tokio::test]
async fn timeout_fails_job_with_reasoning() {
    let engine = JobEngine::new(
        FakeAnswerer::new(vec![Reply::Hang]),
        FakeSerp(Ok(None)),
        settings(),
    );
    let recorder = MemoryRecorder::default();

    let report = engine.submit_job(&request(), &recorder).await.unwrap();

    assert_eq!(report.job.phase, JobPhase::Failed);
    assert!(report.judgement.is_none());
    assert!(report
        .job
        .reasoning
        .as_deref()
        .is_some_and(|r| r.contains("did not respond")));
    assert_eq!(
        recorder.phases(),
        vec![
            JobPhase::Pending,
            JobPhase::Scraping,
            JobPhase::Thinking,
            JobPhase::Failed
        ]
    );
    assert_completed_at_invariant(&recorder);
    assert_eq!(engine.answerer.calls.load(Ordering::SeqCst), 2, "one retry");
}

#[tokio::test]
async fn transient_status_is_retried_then_succeeds() {
    let engine = JobEngine::new(
        FakeAnswerer::new(vec![Reply::Status(503), Reply::Text("Acme is great.")]),
        FakeSerp(Ok(None)),
        settings(),
    );
    let recorder = MemoryRecorder::default();
    let report = engine.submit_job(&request(), &recorder).await.unwrap();
    assert_eq!(report.job.phase, JobPhase::Complete);
    assert_eq!(engine.answerer.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn client_error_fails_without_retry() {
    let engine = JobEngine::new(
        FakeAnswerer::new(vec![Reply::Status(401)]),
        FakeSerp(Ok(None)),
        settings(),
    );
    let recorder = MemoryRecorder::default();
    let report = engine.submit_job(&request(), &recorder).await.unwrap();
    assert_eq!(report.job.phase, JobPhase::Failed);
    assert_eq!(engine.answerer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        report.job.reasoning.as_deref(),
        Some("answering engine returned HTTP 401")
    );
}

#[tokio::test]
async fn empty_answer_fails_job() {
    let engine = JobEngine::new(
        FakeAnswerer::new(vec![Reply::Text("   ")]),
        FakeSerp(Ok(None)),
        settings(),
    );
    let recorder = MemoryRecorder::default();
    let report = engine.submit_job(&request(), &recorder).await.unwrap();
    assert_eq!(report.job.phase, JobPhase::Failed);
    assert!(report
        .job
        .reasoning
        .as_deref()
        .is_some_and(|r| r.contains("empty answer")));
}

#[tokio::test]
async fn validation_failure_creates_no_job() {
    let engine = JobEngine::new(
        FakeAnswerer::new(vec![Reply::Text("unused")]),
        FakeSerp(Ok(None)),
        settings(),
    );
    let recorder = MemoryRecorder::default();
    let mut req = request();
    req.brand.name = "  ".to_string();

    let err = engine.submit_job(&req, &recorder).await.unwrap_err();

    assert!(matches!(err, AnalysisError::Validation(_)));
    assert!(recorder.phases().is_empty());
    assert_eq!(engine.answerer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn persistence_failure_propagates() {
    let engine = JobEngine::new(
        FakeAnswerer::new(vec![Reply::Text("Acme")]),
        FakeSerp(Ok(None)),
        settings(),
    );
    let recorder = MemoryRecorder {
        fail_create: true,
        ..MemoryRecorder::default()
    };

    let err = engine.submit_job(&request(), &recorder).await.unwrap_err();

    assert!(matches!(err, AnalysisError::Persistence(_)));
    assert_eq!(engine.answerer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn running_a_non_pending_job_is_rejected() {
    let engine = JobEngine::new(
        FakeAnswerer::new(vec![Reply::Text("Acme")]),
        FakeSerp(Ok(None)),
        settings(),
    );
    let recorder = MemoryRecorder::default();
    let mut job = AnalysisJob::for_request(&request());
    job.advance(JobPhase::Failed).unwrap();

    let err = engine.run(job, &request(), &recorder).await.unwrap_err();
    assert!(matches!(err, AnalysisError::Core(_)));
}
