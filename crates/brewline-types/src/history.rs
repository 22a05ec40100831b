//! Durable history types.
//!
//! Every decision an order workflow makes is appended to its history before
//! the workflow moves on. Replaying a history reproduces the same decisions
//! without re-running side effects that already completed.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::order::{OrderRequest, OrderResult, WorkflowPhase};

/// Side-effecting steps of the order workflow, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStep {
    Charge,
    Brew,
    Notify,
}

impl OrderStep {
    /// Steps in the order the workflow runs them.
    pub const SEQUENCE: [OrderStep; 3] = [OrderStep::Charge, OrderStep::Brew, OrderStep::Notify];

    /// Registered activity type name for this step.
    pub fn activity_type(&self) -> &'static str {
        match self {
            Self::Charge => "charge_customer",
            Self::Brew => "brew_coffee",
            Self::Notify => "send_receipt",
        }
    }

    /// Phase entered while the step is in flight.
    pub fn running_phase(&self) -> WorkflowPhase {
        match self {
            Self::Charge => WorkflowPhase::Charging,
            Self::Brew => WorkflowPhase::Brewing,
            Self::Notify => WorkflowPhase::Notifying,
        }
    }

    /// Phase entered once the step has succeeded.
    pub fn completed_phase(&self) -> WorkflowPhase {
        match self {
            Self::Charge => WorkflowPhase::Charged,
            Self::Brew => WorkflowPhase::Brewed,
            Self::Notify => WorkflowPhase::Completed,
        }
    }
}

impl fmt::Display for OrderStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Charge => f.write_str("charge"),
            Self::Brew => f.write_str("brew"),
            Self::Notify => f.write_str("notify"),
        }
    }
}

/// A single recorded decision or fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryEvent {
    /// The instance was created with this input.
    WorkflowStarted {
        run_id: Uuid,
        workflow_type: String,
        task_queue: String,
        request: OrderRequest,
    },
    /// Pricing ran and produced this amount.
    OrderPriced { amount_cents: i64 },
    /// The step passed its cancellation check-point and was dispatched.
    StepScheduled { step: OrderStep },
    /// The step succeeded after `attempts` attempts.
    StepCompleted { step: OrderStep, attempts: u32 },
    /// The step exhausted its retries.
    StepFailed {
        step: OrderStep,
        attempts: u32,
        error: String,
    },
    /// A `cancel_order` signal was received.
    CancelRequested,
    /// The instance reached a terminal state.
    WorkflowClosed { result: OrderResult },
}

impl HistoryEvent {
    /// Short name for logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::WorkflowStarted { .. } => "workflow_started",
            Self::OrderPriced { .. } => "order_priced",
            Self::StepScheduled { .. } => "step_scheduled",
            Self::StepCompleted { .. } => "step_completed",
            Self::StepFailed { .. } => "step_failed",
            Self::CancelRequested => "cancel_requested",
            Self::WorkflowClosed { .. } => "workflow_closed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::WorkflowClosed { .. })
    }
}

/// A history event as persisted for one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub instance_key: String,
    /// 1-based position within the instance history.
    pub sequence: u64,
    pub event: HistoryEvent,
    pub recorded_at: DateTime<Utc>,
}
