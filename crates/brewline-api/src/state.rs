//! Worker state wiring the engine, history store, and services together.
//!
//! Services are built exactly once here and handed to the engine through
//! the worker registration; handlers only ever see the engine.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use brewline_core::engine::{LocalEngine, WorkerRegistration};
use brewline_core::pricing::StandardPricing;
use brewline_infra::services::build_runtime;
use brewline_infra::store::HistoryStore;
use brewline_types::config::BrewlineConfig;

/// The engine pinned to the configured history backend.
pub type WorkerEngine = LocalEngine<HistoryStore>;

/// Shared state for the HTTP surface.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkerEngine>,
    pub config: Arc<BrewlineConfig>,
}

impl AppState {
    /// Open history, build services, and register the order worker.
    ///
    /// `seed` makes simulated brew failures reproducible.
    pub async fn init(
        data_dir: &Path,
        config: BrewlineConfig,
        seed: Option<u64>,
    ) -> anyhow::Result<Self> {
        config.validate().context("invalid configuration")?;

        let store = HistoryStore::open(config.history.backend, data_dir)
            .await
            .context("failed to open workflow history")?;
        let engine = LocalEngine::new(Arc::new(store));

        let runtime = build_runtime(&config, StandardPricing::default(), seed);
        engine
            .register(WorkerRegistration::order_worker(
                config.task_queue.clone(),
                runtime,
            ))
            .context("failed to register order worker")?;

        Ok(Self {
            engine: Arc::new(engine),
            config: Arc::new(config),
        })
    }
}
