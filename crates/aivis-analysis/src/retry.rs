//! Retry with exponential back-off and jitter for upstream collaborators.
//!
//! Only transient failures are retried. Once `max_retries` extra attempts are
//! spent the last error is returned and the caller fails the job.

use std::future::Future;
use std::time::Duration;

use crate::error::AnalysisError;

/// Returns `true` for errors worth retrying after a back-off delay.
///
/// **Retriable:** network timeouts and connection failures, HTTP 429 and 5xx,
/// and per-attempt timeouts.
///
/// **Not retriable:** malformed or empty answers, other 4xx statuses,
/// validation, phase, and persistence errors.
pub(crate) fn is_retriable(err: &AnalysisError) -> bool {
    match err {
        AnalysisError::Http(e) => {
            e.is_timeout()
                || e.is_connect()
                || e.status()
                    .is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
        }
        AnalysisError::UpstreamStatus { status, .. } => *status == 429 || *status >= 500,
        AnalysisError::Timeout { .. } => true,
        AnalysisError::Validation(_)
        | AnalysisError::MalformedResponse { .. }
        | AnalysisError::EmptyAnswer { .. }
        | AnalysisError::Core(_)
        | AnalysisError::Persistence(_) => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on transient errors.
///
/// The delay before retry `n` is `backoff_base_ms × 2ⁿ⁻¹ ± 25 %`, capped at 60 s.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, AnalysisError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AnalysisError>>,
{
    const MAX_DELAY_MS: u64 = 60_000;
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "upstream transient error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
