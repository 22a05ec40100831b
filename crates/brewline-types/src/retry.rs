//! Retry policy attached to every side-effecting step.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Retry configuration for a workflow step.
///
/// Durations are carried as milliseconds on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first (default 5).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt (default 1000 ms).
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,
    /// Multiplier applied to the delay after each failed attempt (default 2.0).
    #[serde(default = "default_backoff_coefficient")]
    pub backoff_coefficient: f64,
    /// Wall-clock bound for a single attempt (default 10000 ms).
    #[serde(default = "default_start_to_close_timeout_ms")]
    pub start_to_close_timeout_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_interval_ms() -> u64 {
    1_000
}

fn default_backoff_coefficient() -> f64 {
    2.0
}

fn default_start_to_close_timeout_ms() -> u64 {
    10_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_interval_ms: default_initial_interval_ms(),
            backoff_coefficient: default_backoff_coefficient(),
            start_to_close_timeout_ms: default_start_to_close_timeout_ms(),
        }
    }
}

impl RetryPolicy {
    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    pub fn start_to_close_timeout(&self) -> Duration {
        Duration::from_millis(self.start_to_close_timeout_ms)
    }

    /// Delay to wait after failed attempt `attempt` (1-based):
    /// `initial_interval * backoff_coefficient^(attempt-1)`.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let millis = self.initial_interval_ms as f64 * self.backoff_coefficient.powi(exponent);
        if millis.is_finite() && millis < u64::MAX as f64 {
            Duration::from_millis(millis.round() as u64)
        } else {
            Duration::from_millis(u64::MAX)
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts < 1 {
            return Err(ValidationError::InvalidRetryPolicy(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if !self.backoff_coefficient.is_finite() || self.backoff_coefficient < 1.0 {
            return Err(ValidationError::InvalidRetryPolicy(format!(
                "backoff_coefficient must be >= 1.0, got {}",
                self.backoff_coefficient
            )));
        }
        if self.start_to_close_timeout_ms == 0 {
            return Err(ValidationError::InvalidRetryPolicy(
                "start_to_close_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
