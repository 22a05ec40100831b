//! The order workflow: activities, retry contract, state machine, and
//! durable history.
//!
//! An order runs pricing, then charge, brew, and notify in strict order. Each
//! side-effecting step goes through the [`retry::StepExecutor`]; every
//! decision is recorded through [`checkpoint::HistoryRecorder`] before the
//! state machine moves on, so a restarted worker can replay the history and
//! reach the same state without re-running completed steps.

pub mod activities;
pub mod checkpoint;
pub mod order;
pub mod retry;
pub mod state;

use std::sync::Arc;

use brewline_types::retry::RetryPolicy;
use tokio::sync::oneshot;

use crate::pricing::PricingPolicy;

use self::activities::OrderActivities;

/// Registered name of the order workflow type.
pub const ORDER_WORKFLOW_TYPE: &str = "OrderCoffeeWorkflow";

/// Signal that requests cancellation at the next check-point.
pub const CANCEL_SIGNAL: &str = "cancel_order";

/// Query that returns the current `OrderStatusView`.
pub const STATUS_QUERY: &str = "get_status";

/// Messages delivered to a running order instance.
#[derive(Debug)]
pub enum WorkflowSignal {
    /// Request cancellation. `applied` fires once the instance has set its
    /// `cancelled` flag.
    Cancel { applied: oneshot::Sender<()> },
}

impl WorkflowSignal {
    /// A cancel signal and the receiver that resolves once it is applied.
    pub fn cancel() -> (Self, oneshot::Receiver<()>) {
        let (applied, rx) = oneshot::channel();
        (Self::Cancel { applied }, rx)
    }
}

/// Everything an order instance needs to execute, built once at worker
/// startup and shared by every instance on that worker.
#[derive(Clone)]
pub struct OrderRuntime {
    pub activities: Arc<OrderActivities>,
    pub pricing: Arc<dyn PricingPolicy>,
    pub retry: RetryPolicy,
}

impl OrderRuntime {
    pub fn new(
        activities: OrderActivities,
        pricing: impl PricingPolicy + 'static,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            activities: Arc::new(activities),
            pricing: Arc::new(pricing),
            retry,
        }
    }
}

impl std::fmt::Debug for OrderRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderRuntime")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
