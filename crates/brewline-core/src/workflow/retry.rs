//! Retry contract for side-effecting steps.
//!
//! `RetryHandler` holds the stateless attempt/backoff rules. `StepExecutor`
//! applies them around a single activity: every attempt is bounded by the
//! policy's start-to-close timeout, failed attempts are followed by an
//! exponential backoff sleep, and running out of attempts is reported as a
//! typed [`StepError::Exhausted`]. What happens after exhaustion is the
//! workflow's decision, not the executor's.

use std::future::Future;
use std::time::Duration;

use brewline_types::error::ServiceError;
use brewline_types::history::OrderStep;
use brewline_types::retry::RetryPolicy;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a single attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("attempt timed out after {after_ms} ms")]
    TimedOut { after_ms: u64 },
}

/// Terminal failure of a step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepError {
    #[error("{step} failed after {attempts} attempt(s): {last_error}")]
    Exhausted {
        step: OrderStep,
        attempts: u32,
        last_error: AttemptError,
    },
}

// ---------------------------------------------------------------------------
// RetryHandler
// ---------------------------------------------------------------------------

/// Stateless retry rules. All logic is in associated functions that take the
/// policy as a parameter.
pub struct RetryHandler;

impl RetryHandler {
    /// Whether another attempt is allowed after attempt `attempt` failed.
    ///
    /// `attempt` is 1-based (first execution is attempt 1).
    pub fn should_retry(policy: &RetryPolicy, attempt: u32) -> bool {
        attempt < policy.max_attempts
    }

    /// Delay before the attempt that follows failed attempt `attempt`.
    pub fn backoff(policy: &RetryPolicy, attempt: u32) -> Duration {
        policy.backoff_after(attempt)
    }

    /// Full backoff schedule between attempts: `max_attempts - 1` entries.
    pub fn schedule(policy: &RetryPolicy) -> Vec<Duration> {
        (1..policy.max_attempts)
            .map(|attempt| Self::backoff(policy, attempt))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// StepExecutor
// ---------------------------------------------------------------------------

/// Outcome of a step that eventually succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    /// Attempts used, including the successful one.
    pub attempts: u32,
}

/// Runs one step under a retry policy.
#[derive(Debug, Clone)]
pub struct StepExecutor {
    policy: RetryPolicy,
}

impl StepExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Invoke `call` until it succeeds or the policy is exhausted.
    ///
    /// `call` receives the 1-based attempt number.
    pub async fn execute<F, Fut>(&self, step: OrderStep, mut call: F) -> Result<StepOutcome, StepError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<(), ServiceError>>,
    {
        let timeout = self.policy.start_to_close_timeout();
        let mut attempt: u32 = 1;

        loop {
            let failure = match tokio::time::timeout(timeout, call(attempt)).await {
                Ok(Ok(())) => {
                    tracing::debug!(step = %step, attempt, "step succeeded");
                    return Ok(StepOutcome { attempts: attempt });
                }
                Ok(Err(e)) => AttemptError::Service(e),
                Err(_) => AttemptError::TimedOut {
                    after_ms: timeout.as_millis() as u64,
                },
            };

            if !RetryHandler::should_retry(&self.policy, attempt) {
                tracing::warn!(
                    step = %step,
                    attempt,
                    error = %failure,
                    "step exhausted its retries"
                );
                return Err(StepError::Exhausted {
                    step,
                    attempts: attempt,
                    last_error: failure,
                });
            }

            let backoff = RetryHandler::backoff(&self.policy, attempt);
            tracing::warn!(
                step = %step,
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                error = %failure,
                "step attempt failed, retrying"
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
