//! Visibility analysis for tracked prompts.
//!
//! Drives each (prompt, model, persona) through the job phase machine:
//! gather a SERP snapshot, ask the answering engine, judge the answer for
//! brand mention, rank, sentiment and citations, then score it. The alert
//! evaluator compares consecutive score states and emits alert events.

pub mod alerts;
pub mod answer_client;
pub mod collaborators;
pub mod detect;
pub mod engine;
pub mod error;
pub mod job;
pub mod judge;
pub mod notify;
pub mod scorer;
pub mod serp_client;

mod retry;

pub use alerts::{evaluate_alerts, AlertContext, AlertEvent, ScoreState};
pub use answer_client::OpenAiAnswerClient;
pub use collaborators::{AnswerRequest, AnsweringEngine, SerpProvider, SerpQuery};
pub use engine::{EngineSettings, JobEngine, JobRecorder, JobReport};
pub use error::AnalysisError;
pub use job::{AnalysisJob, JobRequest, TrackedEntity};
pub use judge::{judge_answer, CompetitorStanding, Judgement};
pub use notify::{dispatch_alerts, LogNotifier, Notifier, WebhookNotifier};
pub use scorer::{classify_sentiment, lexicon_score, visibility_score, ScoreInputs};
pub use serp_client::SerpApiClient;
