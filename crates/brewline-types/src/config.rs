//! Configuration types for Brewline.
//!
//! `BrewlineConfig` represents the top-level `config.toml` that controls the
//! worker's task queue, listen address, retry policy, and simulated service
//! behavior. All fields have sensible defaults.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::retry::RetryPolicy;

/// Task queue the order worker polls by default.
pub const DEFAULT_TASK_QUEUE: &str = "coffee-orders";

/// Default address for the worker's HTTP surface.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:7233";

/// Top-level configuration.
///
/// Loaded from `~/.brewline/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrewlineConfig {
    #[serde(default = "default_task_queue")]
    pub task_queue: String,

    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Retry policy applied to charge, brew, and notify.
    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub services: ServiceConfig,

    #[serde(default)]
    pub history: HistoryConfig,
}

fn default_task_queue() -> String {
    DEFAULT_TASK_QUEUE.to_string()
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

impl Default for BrewlineConfig {
    fn default() -> Self {
        Self {
            task_queue: default_task_queue(),
            listen_addr: default_listen_addr(),
            retry: RetryPolicy::default(),
            services: ServiceConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl BrewlineConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.task_queue.trim().is_empty() {
            return Err(ValidationError::InvalidConfig(
                "task_queue must not be empty".to_string(),
            ));
        }
        self.retry.validate()?;
        self.services.validate()
    }
}

/// Latency and failure injection for the simulated side-effect services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_charge_latency_ms")]
    pub charge_latency_ms: u64,
    #[serde(default = "default_brew_latency_ms")]
    pub brew_latency_ms: u64,
    /// Probability in `[0, 1]` that a single brew attempt fails.
    #[serde(default = "default_brew_failure_rate")]
    pub brew_failure_rate: f64,
    #[serde(default = "default_notify_latency_ms")]
    pub notify_latency_ms: u64,
}

fn default_charge_latency_ms() -> u64 {
    500
}

fn default_brew_latency_ms() -> u64 {
    1_000
}

fn default_brew_failure_rate() -> f64 {
    0.3
}

fn default_notify_latency_ms() -> u64 {
    300
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            charge_latency_ms: default_charge_latency_ms(),
            brew_latency_ms: default_brew_latency_ms(),
            brew_failure_rate: default_brew_failure_rate(),
            notify_latency_ms: default_notify_latency_ms(),
        }
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(0.0..=1.0).contains(&self.brew_failure_rate) {
            return Err(ValidationError::InvalidConfig(format!(
                "brew_failure_rate must be within [0, 1], got {}",
                self.brew_failure_rate
            )));
        }
        Ok(())
    }
}

/// Where workflow histories are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryBackend {
    /// Durable SQLite file in the data directory.
    #[default]
    Sqlite,
    /// Process-local; histories are lost on restart.
    Memory,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default)]
    pub backend: HistoryBackend,
}
