//! Typed client surface for order workflows.
//!
//! Wraps any [`WorkflowEngine`] with the order workflow's naming conventions:
//! instance key `order-{order_id}`, the `coffee-orders` task queue, the
//! `cancel_order` signal, and the `get_status` query. Dedup of order ids is
//! the engine's job; this client only forwards its rejection.

use brewline_types::config::DEFAULT_TASK_QUEUE;
use brewline_types::error::ValidationError;
use brewline_types::order::{OrderRequest, OrderResult, OrderStatusView};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::engine::{EngineError, StartOptions, WorkflowEngine, WorkflowHandle};
use crate::workflow::{CANCEL_SIGNAL, ORDER_WORKFLOW_TYPE, STATUS_QUERY};

/// Instance key for an order.
pub fn instance_key(order_id: &str) -> String {
    format!("order-{order_id}")
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("invalid order: {0}")]
    Invalid(#[from] ValidationError),

    #[error("unexpected payload from engine: {0}")]
    Decode(String),
}

impl ClientError {
    /// The engine could not be reached at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Engine(e) if e.is_transport())
    }
}

/// Submit, query, cancel, and await orders.
#[derive(Debug, Clone)]
pub struct OrderClient<E: WorkflowEngine> {
    engine: E,
    task_queue: String,
}

impl<E: WorkflowEngine> OrderClient<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            task_queue: DEFAULT_TASK_QUEUE.to_string(),
        }
    }

    pub fn with_task_queue(mut self, task_queue: impl Into<String>) -> Self {
        self.task_queue = task_queue.into();
        self
    }

    /// Start one workflow instance for the order.
    pub async fn submit(&self, request: &OrderRequest) -> Result<WorkflowHandle, ClientError> {
        request.validate()?;
        let input =
            serde_json::to_value(request).map_err(|e| ClientError::Decode(e.to_string()))?;
        let handle = self
            .engine
            .start(
                StartOptions {
                    workflow_type: ORDER_WORKFLOW_TYPE.to_string(),
                    task_queue: self.task_queue.clone(),
                    instance_key: instance_key(&request.order_id),
                },
                input,
            )
            .await?;
        tracing::info!(order_id = %request.order_id, run_id = %handle.run_id, "order submitted");
        Ok(handle)
    }

    /// Current snapshot of the order. Never waits on in-flight steps.
    pub async fn query_status(&self, order_id: &str) -> Result<OrderStatusView, ClientError> {
        let value = self
            .engine
            .query(&instance_key(order_id), STATUS_QUERY)
            .await?;
        decode(value)
    }

    /// Request cancellation. Returns once the signal is accepted, not once
    /// it has taken effect.
    pub async fn cancel(&self, order_id: &str) -> Result<(), ClientError> {
        self.engine
            .signal(&instance_key(order_id), CANCEL_SIGNAL, Value::Null)
            .await?;
        tracing::info!(order_id, "cancel requested");
        Ok(())
    }

    /// Wait for the terminal result.
    pub async fn await_result(&self, order_id: &str) -> Result<OrderResult, ClientError> {
        let value = self.engine.result(&instance_key(order_id)).await?;
        decode(value)
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ClientError> {
    serde_json::from_value(value).map_err(|e| ClientError::Decode(e.to_string()))
}
