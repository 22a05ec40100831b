//! The `WorkflowEngine` port.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::EngineError;

/// How to start an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartOptions {
    pub workflow_type: String,
    pub task_queue: String,
    /// Unique key of the instance; a second start with the same key is
    /// rejected.
    pub instance_key: String,
}

/// Returned by `start`; identifies the instance and this particular run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowHandle {
    pub instance_key: String,
    pub run_id: Uuid,
}

/// Wire body of a start call: the options plus the workflow input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartRequest {
    #[serde(flatten)]
    pub options: StartOptions,
    pub input: Value,
}

/// The durable execution primitives: start, signal, query, result.
///
/// Payloads are JSON at this boundary; typed wrappers live in
/// [`crate::client::OrderClient`]. Uses RPITIT (Rust 2024 edition).
pub trait WorkflowEngine: Send + Sync {
    /// Create a new instance and hand it to a worker polling the queue.
    fn start(
        &self,
        options: StartOptions,
        input: Value,
    ) -> impl std::future::Future<Output = Result<WorkflowHandle, EngineError>> + Send;

    /// Deliver a fire-and-forget signal. Returns once the signal is accepted.
    fn signal(
        &self,
        instance_key: &str,
        signal_name: &str,
        payload: Value,
    ) -> impl std::future::Future<Output = Result<(), EngineError>> + Send;

    /// Synchronous read of a running or closed instance.
    fn query(
        &self,
        instance_key: &str,
        query_name: &str,
    ) -> impl std::future::Future<Output = Result<Value, EngineError>> + Send;

    /// Wait for the terminal payload.
    fn result(
        &self,
        instance_key: &str,
    ) -> impl std::future::Future<Output = Result<Value, EngineError>> + Send;
}

impl<E: WorkflowEngine> WorkflowEngine for Arc<E> {
    fn start(
        &self,
        options: StartOptions,
        input: Value,
    ) -> impl std::future::Future<Output = Result<WorkflowHandle, EngineError>> + Send {
        (**self).start(options, input)
    }

    fn signal(
        &self,
        instance_key: &str,
        signal_name: &str,
        payload: Value,
    ) -> impl std::future::Future<Output = Result<(), EngineError>> + Send {
        (**self).signal(instance_key, signal_name, payload)
    }

    fn query(
        &self,
        instance_key: &str,
        query_name: &str,
    ) -> impl std::future::Future<Output = Result<Value, EngineError>> + Send {
        (**self).query(instance_key, query_name)
    }

    fn result(
        &self,
        instance_key: &str,
    ) -> impl std::future::Future<Output = Result<Value, EngineError>> + Send {
        (**self).result(instance_key)
    }
}
