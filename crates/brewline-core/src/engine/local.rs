//! In-process workflow engine.
//!
//! `LocalEngine` runs each instance as one tokio task that exclusively owns
//! the instance's state. Outside callers only see two channels per instance:
//! a `watch` channel with the latest status snapshot (queries) and an
//! unbounded `mpsc` channel into the run loop (signals). Every decision is
//! recorded in the history repository, so instances left open by a crash or
//! a shutdown are picked up again by [`LocalEngine::recover`].
//!
//! An instance leaves the live map as soon as its task ends. Closed instances
//! are served from history from then on.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use brewline_types::error::RepositoryError;
use brewline_types::history::HistoryEvent;
use brewline_types::order::{OrderRequest, OrderResult, OrderStatusView};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::repository::history::HistoryRepository;
use crate::workflow::activities::ACTIVITY_TYPES;
use crate::workflow::checkpoint::{HistoryError, HistoryRecorder, ReplayState};
use crate::workflow::order::OrderWorkflow;
use crate::workflow::retry::RetryHandler;
use crate::workflow::state::OrderTracker;
use crate::workflow::{
    CANCEL_SIGNAL, ORDER_WORKFLOW_TYPE, OrderRuntime, STATUS_QUERY, WorkflowSignal,
};

use super::{EngineError, StartOptions, WorkflowEngine, WorkflowHandle};

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// What a worker can execute and which queue it polls.
#[derive(Debug, Clone)]
pub struct WorkerRegistration {
    pub task_queue: String,
    pub workflow_types: Vec<String>,
    pub activity_types: Vec<String>,
    pub runtime: OrderRuntime,
}

impl WorkerRegistration {
    /// A worker that runs the order workflow with all of its activities.
    pub fn order_worker(task_queue: impl Into<String>, runtime: OrderRuntime) -> Self {
        Self {
            task_queue: task_queue.into(),
            workflow_types: vec![ORDER_WORKFLOW_TYPE.to_string()],
            activity_types: ACTIVITY_TYPES.iter().map(|a| a.to_string()).collect(),
            runtime,
        }
    }
}

struct Worker {
    workflow_types: Vec<String>,
    runtime: OrderRuntime,
}

impl Worker {
    fn runs(&self, workflow_type: &str) -> bool {
        self.workflow_types.iter().any(|t| t == workflow_type)
    }
}

/// Outside view of one live instance.
#[derive(Clone)]
struct Instance {
    /// Distinguishes this task from a later one under the same key.
    incarnation: u64,
    status: watch::Receiver<OrderStatusView>,
    result: watch::Receiver<Option<OrderResult>>,
    signals: mpsc::UnboundedSender<WorkflowSignal>,
    stop: CancellationToken,
}

// ---------------------------------------------------------------------------
// LocalEngine
// ---------------------------------------------------------------------------

/// Engine that executes workflow instances in the current process.
///
/// Generic over `R: HistoryRepository` for storage flexibility.
pub struct LocalEngine<R: HistoryRepository> {
    repo: Arc<R>,
    /// Registered workers keyed by task queue.
    workers: DashMap<String, Arc<Worker>>,
    /// Live instances keyed by instance key.
    instances: Arc<DashMap<String, Instance>>,
    next_incarnation: AtomicU64,
}

impl<R: HistoryRepository + 'static> LocalEngine<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self {
            repo,
            workers: DashMap::new(),
            instances: Arc::new(DashMap::new()),
            next_incarnation: AtomicU64::new(0),
        }
    }

    pub fn repo(&self) -> &Arc<R> {
        &self.repo
    }

    /// Declare a worker for a task queue. Replaces any earlier registration
    /// for the same queue.
    pub fn register(&self, registration: WorkerRegistration) -> Result<(), EngineError> {
        if let Some(unknown) = registration
            .workflow_types
            .iter()
            .find(|t| t.as_str() != ORDER_WORKFLOW_TYPE)
        {
            return Err(EngineError::UnknownWorkflowType(unknown.clone()));
        }
        if registration.workflow_types.is_empty() {
            return Err(EngineError::InvalidPayload(
                "worker registers no workflow types".to_string(),
            ));
        }
        let missing: Vec<&str> = ACTIVITY_TYPES
            .iter()
            .copied()
            .filter(|a| !registration.activity_types.iter().any(|r| r == a))
            .collect();
        if !missing.is_empty() {
            return Err(EngineError::InvalidPayload(format!(
                "{ORDER_WORKFLOW_TYPE} requires activities: {}",
                missing.join(", ")
            )));
        }
        registration
            .runtime
            .retry
            .validate()
            .map_err(|e| EngineError::InvalidPayload(e.to_string()))?;

        tracing::info!(
            task_queue = %registration.task_queue,
            workflow_types = ?registration.workflow_types,
            activity_types = ?registration.activity_types,
            backoff_schedule = ?RetryHandler::schedule(&registration.runtime.retry),
            "worker registered"
        );
        self.workers.insert(
            registration.task_queue,
            Arc::new(Worker {
                workflow_types: registration.workflow_types,
                runtime: registration.runtime,
            }),
        );
        Ok(())
    }

    /// Re-spawn every open instance found in history.
    ///
    /// Instances whose queue has no registered worker are left open.
    /// Returns the number of instances resumed.
    pub async fn recover(&self) -> Result<usize, EngineError> {
        let open = self
            .repo
            .list_open()
            .await
            .map_err(|e| EngineError::History(e.to_string()))?;

        let mut recovered = 0;
        for key in open {
            if self.instances.contains_key(&key) {
                continue;
            }
            let replay = match self.load_replay(&key).await {
                Ok(replay) => replay,
                Err(e) => {
                    tracing::warn!(instance_key = %key, error = %e, "skipping unreadable history");
                    continue;
                }
            };
            if !replay.is_open() {
                continue;
            }
            let (Some(task_queue), Some(workflow_type)) =
                (replay.task_queue.clone(), replay.workflow_type.clone())
            else {
                tracing::warn!(instance_key = %key, "history has no start event, skipping");
                continue;
            };
            let Some(worker) = self.worker_for(&task_queue) else {
                tracing::warn!(instance_key = %key, task_queue = %task_queue, "no worker for queue, leaving instance open");
                continue;
            };
            if !worker.runs(&workflow_type) {
                tracing::warn!(instance_key = %key, workflow_type = %workflow_type, "worker does not run this workflow type");
                continue;
            }

            let recorder = HistoryRecorder::new(Arc::clone(&self.repo), key.clone(), replay.recorded);
            if self.spawn_instance(&key, worker.runtime.clone(), replay, recorder).is_some() {
                recovered += 1;
            }
        }

        tracing::info!(recovered, "recovered open workflow instances");
        Ok(recovered)
    }

    /// Stop every instance task without recording anything and drop them
    /// from the live map. Their histories stay open, so the next `recover`
    /// resumes them.
    pub fn shutdown(&self) {
        tracing::info!(active = self.active_instances(), "shutting down local engine");
        self.instances.retain(|_, instance| {
            instance.stop.cancel();
            false
        });
    }

    /// Live instances that have not produced a result yet.
    pub fn active_instances(&self) -> usize {
        self.instances
            .iter()
            .filter(|i| i.value().result.borrow().is_none())
            .count()
    }

    fn worker_for(&self, task_queue: &str) -> Option<Arc<Worker>> {
        self.workers.get(task_queue).map(|w| Arc::clone(w.value()))
    }

    /// Why an instance dropped a signal without applying it.
    async fn stopped_before_applying(&self, instance_key: &str) -> EngineError {
        match self.load_replay(instance_key).await {
            Ok(replay) if replay.is_open() => EngineError::Unavailable(format!(
                "{instance_key} stopped before applying the signal"
            )),
            Ok(_) => EngineError::InstanceClosed(instance_key.to_string()),
            Err(e) => e,
        }
    }

    async fn load_replay(&self, instance_key: &str) -> Result<ReplayState, EngineError> {
        let history = self
            .repo
            .load(instance_key)
            .await
            .map_err(|e| EngineError::History(e.to_string()))?;
        if history.is_empty() {
            return Err(EngineError::NotFound(instance_key.to_string()));
        }
        ReplayState::fold(&history).map_err(|e| EngineError::History(e.to_string()))
    }

    /// Insert the instance's channels and spawn its task. Returns `None` if
    /// the key is already live.
    fn spawn_instance(
        &self,
        instance_key: &str,
        runtime: OrderRuntime,
        replay: ReplayState,
        recorder: HistoryRecorder<R>,
    ) -> Option<Uuid> {
        let order_id = replay
            .request
            .as_ref()
            .map(|r| r.order_id.clone())
            .unwrap_or_default();
        let run_id = replay.run_id.unwrap_or_else(Uuid::now_v7);

        let (status_tx, status_rx) = watch::channel(OrderTracker::initial_view(order_id.clone()));
        let (result_tx, result_rx) = watch::channel(None);
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let incarnation = self.next_incarnation.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();

        match self.instances.entry(instance_key.to_string()) {
            Entry::Occupied(_) => return None,
            Entry::Vacant(slot) => {
                slot.insert(Instance {
                    incarnation,
                    status: status_rx,
                    result: result_rx,
                    signals: signal_tx,
                    stop: token.clone(),
                });
            }
        }

        let tracker = OrderTracker::new(order_id, status_tx);
        let workflow = OrderWorkflow::new(runtime, replay, recorder, tracker, signal_rx);
        let instances = Arc::clone(&self.instances);
        let key = instance_key.to_string();

        tokio::spawn(async move {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    tracing::info!(instance_key = %key, "instance suspended by shutdown");
                }
                result = workflow.run() => {
                    result_tx.send_replace(Some(result));
                }
            }
            // Waiters already hold their own receivers.
            instances.remove_if(&key, |_, instance| instance.incarnation == incarnation);
        });

        Some(run_id)
    }
}

impl<R: HistoryRepository + 'static> WorkflowEngine for LocalEngine<R> {
    async fn start(&self, options: StartOptions, input: Value) -> Result<WorkflowHandle, EngineError> {
        let worker = self
            .worker_for(&options.task_queue)
            .ok_or_else(|| EngineError::NoWorker {
                task_queue: options.task_queue.clone(),
            })?;
        if !worker.runs(&options.workflow_type) {
            return Err(EngineError::UnknownWorkflowType(options.workflow_type));
        }

        let request: OrderRequest = serde_json::from_value(input)
            .map_err(|e| EngineError::InvalidPayload(e.to_string()))?;
        request
            .validate()
            .map_err(|e| EngineError::InvalidPayload(e.to_string()))?;

        let key = options.instance_key.clone();
        if self.instances.contains_key(&key)
            || self
                .repo
                .exists(&key)
                .await
                .map_err(|e| EngineError::History(e.to_string()))?
        {
            return Err(EngineError::AlreadyStarted(key));
        }

        let run_id = Uuid::now_v7();
        let mut recorder = HistoryRecorder::new(Arc::clone(&self.repo), key.clone(), 0);
        recorder
            .record(HistoryEvent::WorkflowStarted {
                run_id,
                workflow_type: options.workflow_type.clone(),
                task_queue: options.task_queue.clone(),
                request: request.clone(),
            })
            .await
            .map_err(|e| match e {
                HistoryError::Append(RepositoryError::Conflict(_)) => {
                    EngineError::AlreadyStarted(key.clone())
                }
                other => EngineError::History(other.to_string()),
            })?;

        let replay = ReplayState::started(
            run_id,
            options.workflow_type,
            options.task_queue,
            request,
        );
        if self
            .spawn_instance(&key, worker.runtime.clone(), replay, recorder)
            .is_none()
        {
            return Err(EngineError::AlreadyStarted(key));
        }

        tracing::info!(instance_key = %key, run_id = %run_id, "workflow started");
        Ok(WorkflowHandle {
            instance_key: key,
            run_id,
        })
    }

    async fn signal(
        &self,
        instance_key: &str,
        signal_name: &str,
        _payload: Value,
    ) -> Result<(), EngineError> {
        if signal_name != CANCEL_SIGNAL {
            return Err(EngineError::UnknownSignal(signal_name.to_string()));
        }

        let live = self
            .instances
            .get(instance_key)
            .map(|i| (i.signals.clone(), i.result.borrow().is_some()));

        match live {
            Some((_, true)) => Err(EngineError::InstanceClosed(instance_key.to_string())),
            Some((signals, false)) => {
                let (signal, applied) = WorkflowSignal::cancel();
                if signals.send(signal).is_err() || applied.await.is_err() {
                    return Err(self.stopped_before_applying(instance_key).await);
                }
                tracing::info!(instance_key, signal = signal_name, "signal applied");
                Ok(())
            }
            None => {
                let replay = self.load_replay(instance_key).await?;
                if replay.closed.is_some() {
                    Err(EngineError::InstanceClosed(instance_key.to_string()))
                } else {
                    Err(EngineError::Unavailable(format!(
                        "{instance_key} is open but not loaded on this worker"
                    )))
                }
            }
        }
    }

    async fn query(&self, instance_key: &str, query_name: &str) -> Result<Value, EngineError> {
        if query_name != STATUS_QUERY {
            return Err(EngineError::UnknownQuery(query_name.to_string()));
        }

        let live = self
            .instances
            .get(instance_key)
            .map(|i| i.status.borrow().clone());

        let view = match live {
            Some(view) => view,
            None => {
                let replay = self.load_replay(instance_key).await?;
                OrderStatusView {
                    order_id: replay
                        .request
                        .as_ref()
                        .map(|r| r.order_id.clone())
                        .unwrap_or_default(),
                    phase: replay.phase(),
                    state: replay.state,
                }
            }
        };

        serde_json::to_value(&view).map_err(|e| EngineError::InvalidPayload(e.to_string()))
    }

    async fn result(&self, instance_key: &str) -> Result<Value, EngineError> {
        let live = self.instances.get(instance_key).map(|i| i.result.clone());

        let result = match live {
            Some(mut rx) => {
                let outcome = rx.wait_for(Option::is_some).await.map(|r| r.clone());
                match outcome {
                    Ok(Some(result)) => result,
                    _ => {
                        return Err(EngineError::Unavailable(format!(
                            "{instance_key} stopped before closing"
                        )));
                    }
                }
            }
            None => self.load_replay(instance_key).await?.closed.ok_or_else(|| {
                EngineError::Unavailable(format!("{instance_key} is open but not loaded on this worker"))
            })?,
        };

        serde_json::to_value(&result).map_err(|e| EngineError::InvalidPayload(e.to_string()))
    }
}

impl<R: HistoryRepository> std::fmt::Debug for LocalEngine<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEngine")
            .field("workers", &self.workers.len())
            .field("instances", &self.instances.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
