use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::MatchConfig;
use crate::scoring_client::ScoringError;

/// Fixed-budget, fixed-delay retry policy. The unit of retry in batch runs
/// is a chunk, never an individual job.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = `max_retries + 1`.
    pub max_retries: u32,
    /// Fixed wait between attempts. No backoff, no jitter.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(matching: &MatchConfig) -> Self {
        RetryPolicy {
            max_retries: matching.max_retries,
            delay: Duration::from_millis(matching.retry_delay_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 1,
            delay: Duration::from_millis(1000),
        }
    }
}

/// Runs `op` up to `max_retries + 1` times, sleeping the fixed delay between
/// attempts. Non-retryable errors short-circuit; on exhaustion the last
/// error is returned.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, ScoringError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScoringError>>,
{
    let mut last_error: Option<ScoringError> = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            warn!(
                "Scoring call failed, retrying in {}ms (attempt {}/{})",
                policy.delay.as_millis(),
                attempt + 1,
                policy.max_retries + 1
            );
            tokio::time::sleep(policy.delay).await;
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => last_error = Some(e),
        }
    }

    Err(last_error
        .unwrap_or_else(|| ScoringError::Workflow("retry budget exhausted".to_string())))
}
