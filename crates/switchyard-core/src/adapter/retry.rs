//! Retry with bounded exponential backoff for backend invocations.
//!
//! Timeouts are never retried. Other invocation errors are retried only when
//! [`is_retryable`] classifies them as transient.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::process::InvocationError;

/// Error codes that indicate a transient fault.
pub const TRANSIENT_ERROR_CODES: &[&str] = &[
    "ECONNRESET",
    "ECONNREFUSED",
    "ETIMEDOUT",
    "ENOTFOUND",
    "EAI_AGAIN",
    "EAGAIN",
    "EPIPE",
];

/// Lower-cased message fragments that indicate a transient fault.
pub const TRANSIENT_MESSAGE_PATTERNS: &[&str] = &[
    "rate limit",
    "too many requests",
    "429",
    "service unavailable",
    "503",
    "temporarily unavailable",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts are `max_retries + 1`.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(5_000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (counted from 1):
    /// `min(base * 2^(retry - 1), max)`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Whether an invocation error is worth retrying.
///
/// Timeouts are excluded even though their code is in the transient set:
/// the pipeline stops on the first timeout.
pub fn is_retryable(err: &InvocationError) -> bool {
    match err {
        InvocationError::TimedOut { .. } => false,
        InvocationError::Failed { code, message } => {
            if code
                .as_deref()
                .is_some_and(|c| TRANSIENT_ERROR_CODES.contains(&c))
            {
                return true;
            }
            let lowered = message.to_lowercase();
            TRANSIENT_MESSAGE_PATTERNS
                .iter()
                .any(|pattern| lowered.contains(pattern))
        }
    }
}

/// Run `operation` until it succeeds, fails fatally, times out, or the
/// retry budget is spent. The closure receives the 1-based attempt number.
///
/// On exhaustion the last error is returned unchanged.
pub async fn run_with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, InvocationError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, InvocationError>>,
{
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "invocation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_timeout() => return Err(err),
            Err(err) if !is_retryable(&err) => {
                debug!(attempt, error = %err, "fatal invocation error, not retrying");
                return Err(err);
            }
            Err(err) => {
                if attempt > policy.max_retries {
                    warn!(attempts = attempt, error = %err, "retries exhausted");
                    return Err(err);
                }
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient invocation error, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
