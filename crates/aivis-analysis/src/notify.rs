//! Best-effort alert delivery. Failures are logged and never retried.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

use crate::alerts::AlertEvent;
use crate::error::AnalysisError;

pub trait Notifier: Send + Sync {
    /// # Errors
    ///
    /// Returns [`AnalysisError`] when the sink rejects or cannot receive the event.
    fn notify(
        &self,
        event: &AlertEvent,
    ) -> impl Future<Output = Result<(), AnalysisError>> + Send;
}

/// Writes alerts to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn notify(&self, event: &AlertEvent) -> Result<(), AnalysisError> {
        tracing::info!(
            kind = %event.kind,
            prompt_id = event.context.prompt_id,
            model = %event.context.model,
            competitor = event.competitor.as_deref().unwrap_or(""),
            dedupe_key = %event.dedupe_key(),
            "{}",
            event.message()
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    kind: &'a str,
    message: String,
    dedupe_key: String,
    event: &'a AlertEvent,
}

/// POSTs each alert as JSON to a configured URL.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    /// # Errors
    ///
    /// Returns [`AnalysisError::Http`] if the HTTP client cannot be built.
    pub fn new(url: &str, timeout_secs: u64, user_agent: &str) -> Result<Self, AnalysisError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            url: url.to_owned(),
        })
    }
}

impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &AlertEvent) -> Result<(), AnalysisError> {
        let payload = WebhookPayload {
            kind: event.kind.as_str(),
            message: event.message(),
            dedupe_key: event.dedupe_key(),
            event,
        };
        let response = self.client.post(&self.url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(AnalysisError::UpstreamStatus {
                collaborator: "alert webhook",
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

/// An absent sink accepts everything.
impl<N: Notifier> Notifier for Option<N> {
    async fn notify(&self, event: &AlertEvent) -> Result<(), AnalysisError> {
        match self {
            Some(inner) => inner.notify(event).await,
            None => Ok(()),
        }
    }
}

/// Delivers to both sinks; the first failure is reported after both ran.
impl<A: Notifier, B: Notifier> Notifier for (A, B) {
    async fn notify(&self, event: &AlertEvent) -> Result<(), AnalysisError> {
        let first = self.0.notify(event).await;
        let second = self.1.notify(event).await;
        first.and(second)
    }
}

/// Send every event, logging failures. Returns how many were delivered.
pub async fn dispatch_alerts<N: Notifier>(notifier: &N, events: &[AlertEvent]) -> usize {
    let mut delivered = 0;
    for event in events {
        match notifier.notify(event).await {
            Ok(()) => delivered += 1,
            Err(e) => {
                tracing::error!(
                    kind = %event.kind,
                    prompt_id = event.context.prompt_id,
                    error = %e,
                    "alert delivery failed"
                );
            }
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use aivis_core::AlertKind;

    use super::*;
    use crate::alerts::AlertContext;

    struct Flaky {
        fail_on: usize,
        seen: AtomicUsize,
    }

    impl Notifier for Flaky {
        async fn notify(&self, _event: &AlertEvent) -> Result<(), AnalysisError> {
            let n = self.seen.fetch_add(1, Ordering::SeqCst);
            if n == self.fail_on {
                Err(AnalysisError::UpstreamStatus {
                    collaborator: "alert webhook",
                    status: 500,
                })
            } else {
                Ok(())
            }
        }
    }

    fn event() -> AlertEvent {
        AlertEvent {
            kind: AlertKind::VisibilityDrop,
            context: AlertContext {
                prompt_id: 1,
                prompt_text: "best crm".to_string(),
                brand: "Acme".to_string(),
                model: "gpt-4o".to_string(),
                persona: "default".to_string(),
                job_id: Some(1),
            },
            previous_score: 75.0,
            current_score: 65.0,
            competitor: None,
            previous_competitor_score: None,
            current_competitor_score: None,
            threshold: Some(70.0),
        }
    }

    #[tokio::test]
    async fn dispatch_continues_past_failures() {
        let flaky = Flaky {
            fail_on: 1,
            seen: AtomicUsize::new(0),
        };
        let events = vec![event(), event(), event()];
        assert_eq!(dispatch_alerts(&flaky, &events).await, 2);
        assert_eq!(flaky.seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn pair_delivers_to_both_sinks() {
        let sinks = (
            LogNotifier,
            Some(Flaky {
                fail_on: usize::MAX,
                seen: AtomicUsize::new(0),
            }),
        );
        assert_eq!(dispatch_alerts(&sinks, &[event()]).await, 1);
        assert_eq!(sinks.1.as_ref().unwrap().seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn absent_sink_accepts() {
        let none: Option<LogNotifier> = None;
        assert_eq!(dispatch_alerts(&none, &[event()]).await, 1);
    }
}
