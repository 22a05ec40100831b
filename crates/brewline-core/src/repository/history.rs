//! Workflow history repository trait and an in-memory implementation.

use std::sync::Arc;

use brewline_types::error::RepositoryError;
use brewline_types::history::{HistoryEvent, HistoryRecord};
use dashmap::DashMap;

/// Append-only storage for per-instance workflow histories.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait HistoryRepository: Send + Sync {
    /// Append one record. A record whose `(instance_key, sequence)` already
    /// exists is rejected with `RepositoryError::Conflict`.
    fn append(
        &self,
        record: &HistoryRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Full history of an instance in sequence order (empty if unknown).
    fn load(
        &self,
        instance_key: &str,
    ) -> impl std::future::Future<Output = Result<Vec<HistoryRecord>, RepositoryError>> + Send;

    /// Keys of instances that were started but never closed.
    fn list_open(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<String>, RepositoryError>> + Send;

    /// Whether any history exists for the instance.
    fn exists(
        &self,
        instance_key: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}

impl<R: HistoryRepository> HistoryRepository for Arc<R> {
    fn append(
        &self,
        record: &HistoryRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send {
        (**self).append(record)
    }

    fn load(
        &self,
        instance_key: &str,
    ) -> impl std::future::Future<Output = Result<Vec<HistoryRecord>, RepositoryError>> + Send {
        (**self).load(instance_key)
    }

    fn list_open(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<String>, RepositoryError>> + Send {
        (**self).list_open()
    }

    fn exists(
        &self,
        instance_key: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send {
        (**self).exists(instance_key)
    }
}

/// Process-local history. Used by tests and by workers started without a
/// durable store; everything is lost when the process exits.
#[derive(Debug, Default)]
pub struct InMemoryHistoryRepository {
    histories: DashMap<String, Vec<HistoryRecord>>,
}

impl InMemoryHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryRepository for InMemoryHistoryRepository {
    async fn append(&self, record: &HistoryRecord) -> Result<(), RepositoryError> {
        let mut history = self
            .histories
            .entry(record.instance_key.clone())
            .or_default();
        let expected = history.len() as u64 + 1;
        if record.sequence != expected {
            return Err(RepositoryError::Conflict(format!(
                "{} expects sequence {expected}, got {}",
                record.instance_key, record.sequence
            )));
        }
        history.push(record.clone());
        Ok(())
    }

    async fn load(&self, instance_key: &str) -> Result<Vec<HistoryRecord>, RepositoryError> {
        Ok(self
            .histories
            .get(instance_key)
            .map(|h| h.clone())
            .unwrap_or_default())
    }

    async fn list_open(&self) -> Result<Vec<String>, RepositoryError> {
        let mut open: Vec<String> = self
            .histories
            .iter()
            .filter(|entry| {
                let started = entry
                    .value()
                    .iter()
                    .any(|r| matches!(r.event, HistoryEvent::WorkflowStarted { .. }));
                let closed = entry.value().iter().any(|r| r.event.is_terminal());
                started && !closed
            })
            .map(|entry| entry.key().clone())
            .collect();
        open.sort();
        Ok(open)
    }

    async fn exists(&self, instance_key: &str) -> Result<bool, RepositoryError> {
        Ok(self
            .histories
            .get(instance_key)
            .is_some_and(|h| !h.is_empty()))
    }
}
