//! Durable checkpoints for order instances.
//!
//! `HistoryRecorder` wraps a `HistoryRepository` and appends one event per
//! decision, numbering them itself. `ReplayState::fold` reduces a recorded
//! history back into the facts the workflow needs to resume: which steps
//! already completed, whether one was in flight, whether cancellation was
//! requested, and whether the instance is already closed.

use std::sync::Arc;

use brewline_types::error::RepositoryError;
use brewline_types::history::{HistoryEvent, HistoryRecord, OrderStep};
use brewline_types::order::{OrderRequest, OrderResult, OrderState, OrderStatus, WorkflowPhase};
use chrono::Utc;
use uuid::Uuid;

use crate::repository::history::HistoryRepository;

use super::state::terminal_phase;

// ---------------------------------------------------------------------------
// HistoryError
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("history append failed: {0}")]
    Append(#[source] RepositoryError),

    #[error("history load failed: {0}")]
    Load(#[source] RepositoryError),

    #[error("corrupt history for {instance_key}: {reason}")]
    Corrupt { instance_key: String, reason: String },
}

// ---------------------------------------------------------------------------
// HistoryRecorder
// ---------------------------------------------------------------------------

/// Appends events to one instance's history.
///
/// Generic over `R: HistoryRepository` so it works with any storage backend
/// (SQLite, in-memory, etc.). Every decision is persisted before the
/// workflow moves forward.
pub struct HistoryRecorder<R: HistoryRepository> {
    repo: Arc<R>,
    instance_key: String,
    next_sequence: u64,
}

impl<R: HistoryRepository> HistoryRecorder<R> {
    /// Recorder for an instance whose history already holds `recorded` events.
    pub fn new(repo: Arc<R>, instance_key: impl Into<String>, recorded: u64) -> Self {
        Self {
            repo,
            instance_key: instance_key.into(),
            next_sequence: recorded + 1,
        }
    }

    pub fn instance_key(&self) -> &str {
        &self.instance_key
    }

    /// Number of events recorded so far.
    pub fn recorded(&self) -> u64 {
        self.next_sequence - 1
    }

    pub async fn record(&mut self, event: HistoryEvent) -> Result<(), HistoryError> {
        let record = HistoryRecord {
            instance_key: self.instance_key.clone(),
            sequence: self.next_sequence,
            event,
            recorded_at: Utc::now(),
        };

        self.repo
            .append(&record)
            .await
            .map_err(HistoryError::Append)?;

        tracing::debug!(
            instance_key = %self.instance_key,
            sequence = record.sequence,
            event = record.event.event_type(),
            "recorded history event"
        );
        self.next_sequence += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ReplayState
// ---------------------------------------------------------------------------

/// A step that exhausted its retries, as recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedStep {
    pub step: OrderStep,
    pub attempts: u32,
    pub error: String,
}

/// Facts reconstructed from a history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayState {
    pub run_id: Option<Uuid>,
    pub workflow_type: Option<String>,
    pub task_queue: Option<String>,
    pub request: Option<OrderRequest>,
    /// Recorded price, if pricing already ran.
    pub amount_cents: Option<i64>,
    pub state: OrderState,
    /// Scheduled but not yet completed or failed.
    pub in_flight: Option<OrderStep>,
    pub failed: Option<FailedStep>,
    pub closed: Option<OrderResult>,
    /// Number of events folded.
    pub recorded: u64,
}

impl ReplayState {
    /// Reduce a history (in sequence order) to the state it describes.
    ///
    /// Rejects histories that do not start with `WorkflowStarted`, skip
    /// sequence numbers, complete a step that was never scheduled, or
    /// continue after `WorkflowClosed`.
    pub fn fold(records: &[HistoryRecord]) -> Result<Self, HistoryError> {
        let mut replay = ReplayState::default();

        for (index, record) in records.iter().enumerate() {
            let corrupt = |reason: String| HistoryError::Corrupt {
                instance_key: record.instance_key.clone(),
                reason,
            };

            let expected = index as u64 + 1;
            if record.sequence != expected {
                return Err(corrupt(format!(
                    "expected sequence {expected}, found {}",
                    record.sequence
                )));
            }
            if replay.closed.is_some() {
                return Err(corrupt(format!(
                    "{} recorded after workflow_closed",
                    record.event.event_type()
                )));
            }
            if index == 0 && !matches!(record.event, HistoryEvent::WorkflowStarted { .. }) {
                return Err(corrupt(format!(
                    "history starts with {}",
                    record.event.event_type()
                )));
            }

            match &record.event {
                HistoryEvent::WorkflowStarted {
                    run_id,
                    workflow_type,
                    task_queue,
                    request,
                } => {
                    if index != 0 {
                        return Err(corrupt("workflow_started recorded twice".to_string()));
                    }
                    replay.run_id = Some(*run_id);
                    replay.workflow_type = Some(workflow_type.clone());
                    replay.task_queue = Some(task_queue.clone());
                    replay.request = Some(request.clone());
                }
                HistoryEvent::OrderPriced { amount_cents } => {
                    replay.amount_cents = Some(*amount_cents);
                    replay.state.amount_cents = *amount_cents;
                }
                HistoryEvent::StepScheduled { step } => {
                    if let Some(other) = replay.in_flight {
                        return Err(corrupt(format!(
                            "{step} scheduled while {other} in flight"
                        )));
                    }
                    replay.in_flight = Some(*step);
                }
                HistoryEvent::StepCompleted { step, .. } => {
                    if replay.in_flight != Some(*step) {
                        return Err(corrupt(format!("{step} completed without being scheduled")));
                    }
                    replay.in_flight = None;
                    match step {
                        OrderStep::Charge => replay.state.charged = true,
                        OrderStep::Brew => replay.state.brewed = true,
                        OrderStep::Notify => replay.state.receipt_sent = true,
                    }
                }
                HistoryEvent::StepFailed {
                    step,
                    attempts,
                    error,
                } => {
                    if replay.in_flight != Some(*step) {
                        return Err(corrupt(format!("{step} failed without being scheduled")));
                    }
                    replay.in_flight = None;
                    replay.failed = Some(FailedStep {
                        step: *step,
                        attempts: *attempts,
                        error: error.clone(),
                    });
                }
                HistoryEvent::CancelRequested => {
                    replay.state.cancelled = true;
                }
                HistoryEvent::WorkflowClosed { result } => {
                    replay.in_flight = None;
                    replay.closed = Some(result.clone());
                }
            }
            replay.recorded = expected;
        }

        Ok(replay)
    }

    /// Fresh state for an instance whose `WorkflowStarted` was just recorded.
    pub fn started(
        run_id: Uuid,
        workflow_type: impl Into<String>,
        task_queue: impl Into<String>,
        request: OrderRequest,
    ) -> Self {
        Self {
            run_id: Some(run_id),
            workflow_type: Some(workflow_type.into()),
            task_queue: Some(task_queue.into()),
            request: Some(request),
            recorded: 1,
            ..Self::default()
        }
    }

    pub fn is_open(&self) -> bool {
        self.request.is_some() && self.closed.is_none()
    }

    /// Phase the instance had reached at the end of the history, not
    /// counting a step that was in flight.
    pub fn phase(&self) -> WorkflowPhase {
        if let Some(result) = &self.closed {
            return terminal_phase(result.status);
        }
        if self.failed.is_some() {
            return WorkflowPhase::Failed;
        }
        OrderStep::SEQUENCE
            .iter()
            .rev()
            .find(|step| super::state::step_done(&self.state, **step))
            .map(|step| step.completed_phase())
            .unwrap_or(if self.amount_cents.is_some() {
                WorkflowPhase::Priced
            } else {
                WorkflowPhase::Created
            })
    }

    /// Terminal status already implied by the history, if any.
    pub fn decided_status(&self) -> Option<OrderStatus> {
        if let Some(result) = &self.closed {
            return Some(result.status);
        }
        self.failed.as_ref().map(|_| OrderStatus::Failed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::history::InMemoryHistoryRepository;
    use brewline_types::order::{Drink, DrinkSize};

    fn request() -> OrderRequest {
        OrderRequest::new("42", Drink::Latte, DrinkSize::M)
    }

    async fn record_all(events: Vec<HistoryEvent>) -> (Arc<InMemoryHistoryRepository>, Vec<HistoryRecord>) {
        let repo = Arc::new(InMemoryHistoryRepository::new());
        let mut recorder = HistoryRecorder::new(Arc::clone(&repo), "order-42", 0);
        for event in events {
            recorder.record(event).await.unwrap();
        }
        let history = repo.load("order-42").await.unwrap();
        (repo, history)
    }

    fn started_event() -> HistoryEvent {
        HistoryEvent::WorkflowStarted {
            run_id: Uuid::now_v7(),
            workflow_type: "OrderCoffeeWorkflow".to_string(),
            task_queue: "coffee-orders".to_string(),
            request: request(),
        }
    }

    #[tokio::test]
    async fn test_recorder_numbers_events_sequentially() {
        let (_repo, history) = record_all(vec![
            started_event(),
            HistoryEvent::OrderPriced { amount_cents: 525 },
        ])
        .await;
        let sequences: Vec<u64> = history.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_fold_tracks_in_flight_step() {
        let (_repo, history) = record_all(vec![
            started_event(),
            HistoryEvent::OrderPriced { amount_cents: 525 },
            HistoryEvent::StepScheduled { step: OrderStep::Charge },
            HistoryEvent::StepCompleted {
                step: OrderStep::Charge,
                attempts: 1,
            },
            HistoryEvent::StepScheduled { step: OrderStep::Brew },
        ])
        .await;

        let replay = ReplayState::fold(&history).unwrap();
        assert_eq!(replay.request, Some(request()));
        assert_eq!(replay.amount_cents, Some(525));
        assert!(replay.state.charged);
        assert!(!replay.state.brewed);
        assert_eq!(replay.in_flight, Some(OrderStep::Brew));
        assert_eq!(replay.phase(), WorkflowPhase::Charged);
        assert_eq!(replay.recorded, 5);
        assert!(replay.is_open());
        assert_eq!(replay.decided_status(), None);
    }

    #[tokio::test]
    async fn test_fold_records_cancel_and_failure() {
        let (_repo, history) = record_all(vec![
            started_event(),
            HistoryEvent::OrderPriced { amount_cents: 525 },
            HistoryEvent::CancelRequested,
            HistoryEvent::StepScheduled { step: OrderStep::Charge },
            HistoryEvent::StepFailed {
                step: OrderStep::Charge,
                attempts: 5,
                error: "declined".to_string(),
            },
        ])
        .await;

        let replay = ReplayState::fold(&history).unwrap();
        assert!(replay.state.cancelled);
        assert_eq!(replay.in_flight, None);
        assert_eq!(replay.failed.as_ref().map(|f| f.attempts), Some(5));
        assert_eq!(replay.phase(), WorkflowPhase::Failed);
        assert_eq!(replay.decided_status(), Some(OrderStatus::Failed));
    }

    #[tokio::test]
    async fn test_fold_rejects_completion_without_schedule() {
        let (_repo, history) = record_all(vec![
            started_event(),
            HistoryEvent::StepCompleted {
                step: OrderStep::Brew,
                attempts: 1,
            },
        ])
        .await;

        let err = ReplayState::fold(&history).unwrap_err();
        assert!(err.to_string().contains("brew completed without being scheduled"));
    }

    #[test]
    fn test_fold_rejects_history_without_start() {
        let history = vec![HistoryRecord {
            instance_key: "order-42".to_string(),
            sequence: 1,
            event: HistoryEvent::CancelRequested,
            recorded_at: Utc::now(),
        }];
        assert!(matches!(
            ReplayState::fold(&history),
            Err(HistoryError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_empty_history_folds_to_default() {
        let replay = ReplayState::fold(&[]).unwrap();
        assert!(!replay.is_open());
        assert_eq!(replay.phase(), WorkflowPhase::Created);
    }
}
