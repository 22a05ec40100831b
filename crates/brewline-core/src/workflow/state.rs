//! Order state machine: phase transitions and published snapshots.
//!
//! The running instance is the only writer. Every mutation replaces the whole
//! `OrderStatusView` in a `watch` channel, so a concurrent query sees either
//! the previous snapshot or the next one, never a partial update.

use brewline_types::history::OrderStep;
use brewline_types::order::{OrderState, OrderStatus, OrderStatusView, WorkflowPhase};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("invalid transition {from} -> {to}")]
    Invalid {
        from: WorkflowPhase,
        to: WorkflowPhase,
    },
}

/// Whether the state machine allows `from -> to`.
///
/// The happy path is strictly linear; `CANCELLED` and `FAILED` are reachable
/// from every non-terminal phase, and terminal phases are absorbing.
pub fn can_transition(from: WorkflowPhase, to: WorkflowPhase) -> bool {
    use WorkflowPhase::*;

    if from.is_terminal() {
        return false;
    }
    if matches!(to, Cancelled | Failed) {
        return true;
    }
    matches!(
        (from, to),
        (Created, Priced)
            | (Priced, Charging)
            | (Charging, Charged)
            | (Charged, Brewing)
            | (Brewing, Brewed)
            | (Brewed, Notifying)
            | (Notifying, Completed)
    )
}

/// Phase corresponding to a terminal status.
pub fn terminal_phase(status: OrderStatus) -> WorkflowPhase {
    match status {
        OrderStatus::Completed => WorkflowPhase::Completed,
        OrderStatus::Cancelled => WorkflowPhase::Cancelled,
        OrderStatus::Failed => WorkflowPhase::Failed,
    }
}

/// Whether the flag for `step` is already set.
pub fn step_done(state: &OrderState, step: OrderStep) -> bool {
    match step {
        OrderStep::Charge => state.charged,
        OrderStep::Brew => state.brewed,
        OrderStep::Notify => state.receipt_sent,
    }
}

/// Single-writer holder of an instance's phase and state.
pub struct OrderTracker {
    order_id: String,
    phase: WorkflowPhase,
    state: OrderState,
    publisher: watch::Sender<OrderStatusView>,
}

impl OrderTracker {
    pub fn new(order_id: impl Into<String>, publisher: watch::Sender<OrderStatusView>) -> Self {
        let tracker = Self {
            order_id: order_id.into(),
            phase: WorkflowPhase::Created,
            state: OrderState::default(),
            publisher,
        };
        tracker.publish();
        tracker
    }

    /// Initial view for an instance that has not run yet.
    pub fn initial_view(order_id: impl Into<String>) -> OrderStatusView {
        OrderStatusView {
            order_id: order_id.into(),
            phase: WorkflowPhase::Created,
            state: OrderState::default(),
        }
    }

    pub fn phase(&self) -> WorkflowPhase {
        self.phase
    }

    pub fn state(&self) -> &OrderState {
        &self.state
    }

    pub fn snapshot(&self) -> OrderStatusView {
        OrderStatusView {
            order_id: self.order_id.clone(),
            phase: self.phase,
            state: self.state,
        }
    }

    /// Jump straight to a state rebuilt from history.
    pub fn restore(&mut self, phase: WorkflowPhase, state: OrderState) {
        self.phase = phase;
        self.state = state;
        self.publish();
    }

    pub fn transition(&mut self, to: WorkflowPhase) -> Result<(), TransitionError> {
        if !can_transition(self.phase, to) {
            return Err(TransitionError::Invalid {
                from: self.phase,
                to,
            });
        }
        self.phase = to;
        self.publish();
        Ok(())
    }

    /// CREATED -> PRICED, storing the amount in the same snapshot.
    pub fn priced(&mut self, amount_cents: i64) -> Result<(), TransitionError> {
        if !can_transition(self.phase, WorkflowPhase::Priced) {
            return Err(TransitionError::Invalid {
                from: self.phase,
                to: WorkflowPhase::Priced,
            });
        }
        self.state.amount_cents = amount_cents;
        self.phase = WorkflowPhase::Priced;
        self.publish();
        Ok(())
    }

    /// Flip the step's flag and enter its completed phase atomically.
    pub fn complete_step(&mut self, step: OrderStep) -> Result<(), TransitionError> {
        let to = step.completed_phase();
        if !can_transition(self.phase, to) {
            return Err(TransitionError::Invalid {
                from: self.phase,
                to,
            });
        }
        match step {
            OrderStep::Charge => self.state.charged = true,
            OrderStep::Brew => self.state.brewed = true,
            OrderStep::Notify => self.state.receipt_sent = true,
        }
        self.phase = to;
        self.publish();
        Ok(())
    }

    /// Set `cancelled`. Returns `false` if it was already set.
    pub fn mark_cancelled(&mut self) -> bool {
        if self.state.cancelled {
            return false;
        }
        self.state.cancelled = true;
        self.publish();
        true
    }

    /// Enter the terminal phase for `status`.
    ///
    /// Terminal phases are absorbing, so a tracker that is already terminal
    /// keeps its phase.
    pub fn finish(&mut self, status: OrderStatus) {
        let to = terminal_phase(status);
        if self.phase.is_terminal() {
            if self.phase != to {
                tracing::warn!(order_id = %self.order_id, from = %self.phase, to = %to, "ignoring transition out of terminal phase");
            }
            return;
        }
        self.phase = to;
        self.publish();
    }

    fn publish(&self) {
        self.publisher.send_replace(self.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> (OrderTracker, watch::Receiver<OrderStatusView>) {
        let (tx, rx) = watch::channel(OrderTracker::initial_view("o-1"));
        (OrderTracker::new("o-1", tx), rx)
    }

    #[test]
    fn test_happy_path_transitions() {
        use WorkflowPhase::*;
        let path = [
            Created, Priced, Charging, Charged, Brewing, Brewed, Notifying, Completed,
        ];
        for pair in path.windows(2) {
            assert!(can_transition(pair[0], pair[1]), "{} -> {}", pair[0], pair[1]);
        }
        assert!(!can_transition(Priced, Brewing));
        assert!(!can_transition(Charged, Charging));
    }

    #[test]
    fn test_terminal_phases_are_absorbing() {
        use WorkflowPhase::*;
        for terminal in [Completed, Cancelled, Failed] {
            for to in [Created, Priced, Charging, Cancelled, Failed, Completed] {
                assert!(!can_transition(terminal, to));
            }
        }
        for active in [Created, Priced, Charging, Brewed, Notifying] {
            assert!(can_transition(active, Cancelled));
            assert!(can_transition(active, Failed));
        }
    }

    #[test]
    fn test_complete_step_publishes_flag_and_phase_together() {
        let (mut t, rx) = tracker();
        t.priced(525).unwrap();
        t.transition(WorkflowPhase::Charging).unwrap();
        t.complete_step(OrderStep::Charge).unwrap();

        let view = rx.borrow().clone();
        assert_eq!(view.phase, WorkflowPhase::Charged);
        assert!(view.state.charged);
        assert_eq!(view.state.amount_cents, 525);
    }

    #[test]
    fn test_complete_step_requires_running_phase() {
        let (mut t, _rx) = tracker();
        t.priced(300).unwrap();
        let err = t.complete_step(OrderStep::Brew).unwrap_err();
        assert_eq!(
            err,
            TransitionError::Invalid {
                from: WorkflowPhase::Priced,
                to: WorkflowPhase::Brewed,
            }
        );
        assert!(!t.state().brewed);
    }

    #[test]
    fn test_mark_cancelled_is_idempotent() {
        let (mut t, rx) = tracker();
        assert!(t.mark_cancelled());
        assert!(!t.mark_cancelled());
        assert!(rx.borrow().state.cancelled);
        assert_eq!(t.phase(), WorkflowPhase::Created);
    }

    #[test]
    fn test_finish_keeps_first_terminal_phase() {
        let (mut t, _rx) = tracker();
        t.finish(OrderStatus::Cancelled);
        t.finish(OrderStatus::Failed);
        assert_eq!(t.phase(), WorkflowPhase::Cancelled);
    }

    #[test]
    fn test_step_done_reads_matching_flag() {
        let state = OrderState {
            charged: true,
            ..OrderState::default()
        };
        assert!(step_done(&state, OrderStep::Charge));
        assert!(!step_done(&state, OrderStep::Brew));
    }
}
