//! The order workflow run loop.
//!
//! # Execution flow
//!
//! 1. Restore phase and flags from the replayed history.
//! 2. Price the order; compare with the recorded price on replay.
//! 3. For charge, brew, and notify in order:
//!    check-point (drain signals, stop if cancelled) -> record scheduled ->
//!    run through the step executor while still accepting signals ->
//!    record completed -> flip the flag.
//! 4. Record the terminal result.
//!
//! A cancel signal sets `cancelled` as soon as it is received, but only
//! takes effect at the next check-point. Any fault inside the run (history
//! append failure, non-deterministic pricing, invalid transition) becomes a
//! FAILED result.

use std::pin::pin;
use std::sync::Arc;

use brewline_types::error::ValidationError;
use brewline_types::history::{HistoryEvent, OrderStep};
use brewline_types::order::{OrderRequest, OrderResult, OrderStatus};
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::repository::history::HistoryRepository;

use super::checkpoint::{HistoryError, HistoryRecorder, ReplayState};
use super::retry::{StepError, StepExecutor, StepOutcome};
use super::state::{step_done, OrderTracker, TransitionError};
use super::{OrderRuntime, WorkflowSignal};

/// Faults that abort a run. Each one is converted into a FAILED result.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowFault {
    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("invalid order request: {0}")]
    InvalidRequest(#[from] ValidationError),

    #[error("pricing is not deterministic: recorded {recorded} cents, computed {computed} cents")]
    NonDeterministic { recorded: i64, computed: i64 },

    #[error("history has no workflow input")]
    MissingInput,
}

/// One order instance. Owns its state exclusively; the engine only talks to
/// it through the signal channel and the tracker's watch channel.
pub struct OrderWorkflow<R: HistoryRepository> {
    runtime: OrderRuntime,
    replay: ReplayState,
    recorder: HistoryRecorder<R>,
    tracker: OrderTracker,
    signals: mpsc::UnboundedReceiver<WorkflowSignal>,
    signals_open: bool,
}

impl<R: HistoryRepository> OrderWorkflow<R> {
    pub fn new(
        runtime: OrderRuntime,
        replay: ReplayState,
        recorder: HistoryRecorder<R>,
        tracker: OrderTracker,
        signals: mpsc::UnboundedReceiver<WorkflowSignal>,
    ) -> Self {
        Self {
            runtime,
            replay,
            recorder,
            tracker,
            signals,
            signals_open: true,
        }
    }

    /// Drive the instance to a terminal result. Never panics on faults.
    pub async fn run(mut self) -> OrderResult {
        let order_id = self
            .replay
            .request
            .as_ref()
            .map(|r| r.order_id.clone())
            .unwrap_or_default();
        let span = tracing::info_span!(
            "order_workflow",
            order_id = %order_id,
            instance_key = %self.recorder.instance_key(),
        );

        async move {
            match self.drive().await {
                Ok(result) => {
                    tracing::info!(
                        status = %result.status,
                        amount_cents = result.amount_cents,
                        events = self.recorder.recorded(),
                        "order closed"
                    );
                    result
                }
                Err(fault) => {
                    tracing::error!(error = %fault, "order workflow fault");
                    self.close_best_effort(OrderStatus::Failed).await
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn drive(&mut self) -> Result<OrderResult, WorkflowFault> {
        if let Some(result) = self.replay.closed.clone() {
            self.tracker.restore(self.replay.phase(), self.replay.state);
            return Ok(result);
        }

        let request = self.replay.request.clone().ok_or(WorkflowFault::MissingInput)?;
        request.validate()?;

        self.tracker.restore(self.replay.phase(), self.replay.state);
        if self.replay.decided_status() == Some(OrderStatus::Failed) {
            return self.close(OrderStatus::Failed).await;
        }

        let amount_cents = self.runtime.pricing.price_cents(&request);
        match self.replay.amount_cents {
            Some(recorded) if recorded != amount_cents => {
                return Err(WorkflowFault::NonDeterministic {
                    recorded,
                    computed: amount_cents,
                });
            }
            Some(_) => {}
            None => {
                self.recorder
                    .record(HistoryEvent::OrderPriced { amount_cents })
                    .await?;
                self.tracker.priced(amount_cents)?;
            }
        }

        for step in OrderStep::SEQUENCE {
            if step_done(self.tracker.state(), step) {
                continue;
            }

            if self.replay.in_flight == Some(step) {
                tracing::info!(step = %step, "resuming step that was in flight");
            } else {
                self.drain_signals().await?;
                if self.tracker.state().cancelled {
                    tracing::info!(step = %step, "cancellation observed at check-point");
                    return self.close(OrderStatus::Cancelled).await;
                }
                self.recorder
                    .record(HistoryEvent::StepScheduled { step })
                    .await?;
            }

            self.tracker.transition(step.running_phase())?;

            match self.run_step(step, &request, amount_cents).await? {
                Ok(outcome) => {
                    self.recorder
                        .record(HistoryEvent::StepCompleted {
                            step,
                            attempts: outcome.attempts,
                        })
                        .await?;
                    self.tracker.complete_step(step)?;
                }
                Err(StepError::Exhausted {
                    step,
                    attempts,
                    last_error,
                }) => {
                    self.recorder
                        .record(HistoryEvent::StepFailed {
                            step,
                            attempts,
                            error: last_error.to_string(),
                        })
                        .await?;
                    return self.close(OrderStatus::Failed).await;
                }
            }
        }

        self.close(OrderStatus::Completed).await
    }

    /// Run one step while continuing to accept signals.
    ///
    /// The outer `Result` carries faults from handling a signal; the inner
    /// one is the step's own outcome.
    async fn run_step(
        &mut self,
        step: OrderStep,
        request: &OrderRequest,
        amount_cents: i64,
    ) -> Result<Result<StepOutcome, StepError>, WorkflowFault> {
        let executor = StepExecutor::new(self.runtime.retry.clone());
        let activities = Arc::clone(&self.runtime.activities);
        let services = activities.as_ref();

        let mut execution = pin!(executor.execute(step, move |_attempt| {
            services.run_step(step, request, amount_cents)
        }));

        loop {
            tokio::select! {
                biased;

                outcome = &mut execution => return Ok(outcome),
                signal = self.signals.recv(), if self.signals_open => match signal {
                    Some(signal) => self.on_signal(signal).await?,
                    None => self.signals_open = false,
                },
            }
        }
    }

    /// Handle every signal that is already queued.
    async fn drain_signals(&mut self) -> Result<(), WorkflowFault> {
        while self.signals_open {
            match self.signals.try_recv() {
                Ok(signal) => self.on_signal(signal).await?,
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => self.signals_open = false,
            }
        }
        Ok(())
    }

    async fn on_signal(&mut self, signal: WorkflowSignal) -> Result<(), WorkflowFault> {
        match signal {
            WorkflowSignal::Cancel { applied } => {
                if self.tracker.state().cancelled {
                    tracing::debug!("duplicate cancel ignored");
                } else {
                    self.recorder.record(HistoryEvent::CancelRequested).await?;
                    self.tracker.mark_cancelled();
                    tracing::info!(phase = %self.tracker.phase(), "cancel requested");
                }
                // The sender may have given up waiting.
                let _ = applied.send(());
            }
        }
        Ok(())
    }

    /// Record and publish the terminal result.
    ///
    /// The decision is final once made: if the closing append fails the
    /// result is still returned, and the open history replays to the same
    /// decision on recovery.
    async fn close(&mut self, status: OrderStatus) -> Result<OrderResult, WorkflowFault> {
        Ok(self.close_best_effort(status).await)
    }

    async fn close_best_effort(&mut self, status: OrderStatus) -> OrderResult {
        let result = OrderResult::from_state(self.order_id(), status, self.tracker.state());
        if let Err(e) = self
            .recorder
            .record(HistoryEvent::WorkflowClosed {
                result: result.clone(),
            })
            .await
        {
            tracing::error!(error = %e, status = %status, "failed to record workflow close");
        }
        self.tracker.finish(status);
        result
    }

    fn order_id(&self) -> String {
        self.replay
            .request
            .as_ref()
            .map(|r| r.order_id.clone())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use brewline_types::order::{Drink, DrinkSize, OrderStatusView, WorkflowPhase};
    use tokio::sync::{oneshot, watch};
    use uuid::Uuid;

    use crate::repository::history::InMemoryHistoryRepository;
    use crate::testing::{FakeBrewer, FakeNotifier, FakePayment, FakeRuntime};
    use crate::workflow::ORDER_WORKFLOW_TYPE;

    const KEY: &str = "order-42";

    struct Harness {
        repo: Arc<InMemoryHistoryRepository>,
        signals: mpsc::UnboundedSender<WorkflowSignal>,
        status: watch::Receiver<OrderStatusView>,
        workflow: OrderWorkflow<InMemoryHistoryRepository>,
    }

    async fn harness(fakes: &FakeRuntime, request: OrderRequest) -> Harness {
        let repo = Arc::new(InMemoryHistoryRepository::new());
        let mut recorder = HistoryRecorder::new(Arc::clone(&repo), KEY, 0);
        let run_id = Uuid::now_v7();
        recorder
            .record(HistoryEvent::WorkflowStarted {
                run_id,
                workflow_type: ORDER_WORKFLOW_TYPE.to_string(),
                task_queue: "coffee-orders".to_string(),
                request: request.clone(),
            })
            .await
            .unwrap();
        let replay = ReplayState::started(run_id, ORDER_WORKFLOW_TYPE, "coffee-orders", request.clone());
        resume(fakes, repo, replay, recorder)
    }

    fn resume(
        fakes: &FakeRuntime,
        repo: Arc<InMemoryHistoryRepository>,
        replay: ReplayState,
        recorder: HistoryRecorder<InMemoryHistoryRepository>,
    ) -> Harness {
        let order_id = replay.request.as_ref().map(|r| r.order_id.clone()).unwrap_or_default();
        let (status_tx, status) = watch::channel(OrderTracker::initial_view(order_id.clone()));
        let (signals, signal_rx) = mpsc::unbounded_channel();
        let tracker = OrderTracker::new(order_id, status_tx);
        let workflow = OrderWorkflow::new(fakes.runtime.clone(), replay, recorder, tracker, signal_rx);
        Harness {
            repo,
            signals,
            status,
            workflow,
        }
    }

    /// Queue a cancel; the receiver resolves once the run loop applied it.
    fn send_cancel(signals: &mpsc::UnboundedSender<WorkflowSignal>) -> oneshot::Receiver<()> {
        let (signal, applied) = WorkflowSignal::cancel();
        signals.send(signal).unwrap();
        applied
    }

    fn latte() -> OrderRequest {
        OrderRequest::new("42", Drink::Latte, DrinkSize::M)
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_success_path_completes() {
        let fakes = FakeRuntime::healthy();
        let h = harness(&fakes, latte()).await;

        let result = h.workflow.run().await;

        assert_eq!(result.status, OrderStatus::Completed);
        assert!(result.charged && result.brewed && result.receipt_sent);
        assert_eq!(result.amount_cents, 525);
        assert!(result.is_consistent());
        assert_eq!(h.status.borrow().phase, WorkflowPhase::Completed);

        let history = h.repo.load(KEY).await.unwrap();
        assert!(history.last().unwrap().event.is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_charge_checkpoint_skips_everything() {
        let fakes = FakeRuntime::healthy();
        let h = harness(&fakes, latte()).await;

        send_cancel(&h.signals);
        let result = h.workflow.run().await;

        assert_eq!(result.status, OrderStatus::Cancelled);
        assert!(!result.charged);
        assert_eq!(fakes.payment.calls(), 0);
        assert!(h.status.borrow().state.cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_charge_takes_effect_before_brew() {
        let payment = FakePayment::new().blocked();
        let fakes = FakeRuntime::new(payment.clone(), FakeBrewer::new(), FakeNotifier::new());
        let h = harness(&fakes, latte()).await;
        let task = tokio::spawn(h.workflow.run());

        payment.wait_for_calls(1).await;
        send_cancel(&h.signals).await.unwrap();
        // Cancellation is visible immediately, the charge is still in flight.
        assert!(h.status.borrow().state.cancelled);
        assert_eq!(h.status.borrow().phase, WorkflowPhase::Charging);

        payment.release();
        let result = task.await.unwrap();

        assert_eq!(result.status, OrderStatus::Cancelled);
        assert!(result.charged);
        assert!(!result.brewed);
        assert_eq!(fakes.brewer.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_charge_completed_stops_at_brew_checkpoint() {
        let fakes = FakeRuntime::healthy();
        let repo = Arc::new(InMemoryHistoryRepository::new());
        let mut recorder = HistoryRecorder::new(Arc::clone(&repo), KEY, 0);
        let events = [
            HistoryEvent::WorkflowStarted {
                run_id: Uuid::now_v7(),
                workflow_type: ORDER_WORKFLOW_TYPE.to_string(),
                task_queue: "coffee-orders".to_string(),
                request: latte(),
            },
            HistoryEvent::OrderPriced { amount_cents: 525 },
            HistoryEvent::StepScheduled { step: OrderStep::Charge },
            HistoryEvent::StepCompleted {
                step: OrderStep::Charge,
                attempts: 1,
            },
            HistoryEvent::CancelRequested,
        ];
        for event in events {
            recorder.record(event).await.unwrap();
        }

        let replay = ReplayState::fold(&repo.load(KEY).await.unwrap()).unwrap();
        assert!(replay.state.charged && replay.state.cancelled);
        assert_eq!(replay.in_flight, None);
        let recorder = HistoryRecorder::new(Arc::clone(&repo), KEY, replay.recorded);
        let h = resume(&fakes, Arc::clone(&repo), replay, recorder);

        let result = h.workflow.run().await;

        assert_eq!(result.status, OrderStatus::Cancelled);
        assert!(result.charged);
        assert!(!result.brewed);
        assert!(!result.receipt_sent);
        assert_eq!(result.amount_cents, 525);
        assert_eq!(fakes.payment.calls(), 0);
        assert_eq!(fakes.brewer.calls(), 0);
        assert_eq!(fakes.notifier.calls(), 0);
        assert_eq!(h.status.borrow().phase, WorkflowPhase::Cancelled);

        let history = repo.load(KEY).await.unwrap();
        assert!(!history.iter().any(|r| r.event == HistoryEvent::StepScheduled { step: OrderStep::Brew }));
        assert!(history.last().unwrap().event.is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_cancel_matches_single_cancel() {
        let fakes = FakeRuntime::healthy();
        let h = harness(&fakes, latte()).await;

        send_cancel(&h.signals);
        send_cancel(&h.signals);
        let result = h.workflow.run().await;

        assert_eq!(result.status, OrderStatus::Cancelled);
        let cancels = h
            .repo
            .load(KEY)
            .await
            .unwrap()
            .iter()
            .filter(|r| r.event == HistoryEvent::CancelRequested)
            .count();
        assert_eq!(cancels, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_brew_recovers_within_retry_budget() {
        let brewer = FakeBrewer::new().failing_first(4);
        let fakes = FakeRuntime::new(FakePayment::new(), brewer.clone(), FakeNotifier::new());
        let h = harness(&fakes, latte()).await;

        let started = tokio::time::Instant::now();
        let result = h.workflow.run().await;

        assert_eq!(result.status, OrderStatus::Completed);
        assert_eq!(brewer.calls(), 5);
        // 1s + 2s + 4s + 8s of backoff.
        assert_eq!(started.elapsed(), Duration::from_secs(15));
        let history = h.repo.load(KEY).await.unwrap();
        assert!(history.iter().any(|r| r.event
            == HistoryEvent::StepCompleted {
                step: OrderStep::Brew,
                attempts: 5
            }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_brew_exhaustion_fails_without_notify() {
        let fakes = FakeRuntime::new(
            FakePayment::new(),
            FakeBrewer::new().always_failing(),
            FakeNotifier::new(),
        );
        let h = harness(&fakes, latte()).await;

        let result = h.workflow.run().await;

        assert_eq!(result.status, OrderStatus::Failed);
        assert!(result.charged);
        assert!(!result.brewed);
        assert!(!result.receipt_sent);
        assert!(result.is_consistent());
        assert_eq!(fakes.brewer.calls(), 5);
        assert_eq!(fakes.notifier.calls(), 0);
        assert_eq!(h.status.borrow().phase, WorkflowPhase::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_during_brew_sees_charged_not_brewed() {
        let brewer = FakeBrewer::new().blocked();
        let fakes = FakeRuntime::new(FakePayment::new(), brewer.clone(), FakeNotifier::new());
        let h = harness(&fakes, latte()).await;
        let task = tokio::spawn(h.workflow.run());

        brewer.wait_for_calls(1).await;
        let view = h.status.borrow().clone();
        assert_eq!(view.phase, WorkflowPhase::Brewing);
        assert!(view.state.charged);
        assert!(!view.state.brewed);

        brewer.release();
        assert_eq!(task.await.unwrap().status, OrderStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_resumes_in_flight_step_without_rerunning_completed_ones() {
        // First run: crash (drop) while brew is in flight.
        let brewer = FakeBrewer::new().blocked();
        let first = FakeRuntime::new(FakePayment::new(), brewer.clone(), FakeNotifier::new());
        let h = harness(&first, latte()).await;
        let repo = Arc::clone(&h.repo);
        let task = tokio::spawn(h.workflow.run());
        brewer.wait_for_calls(1).await;
        task.abort();
        let _ = task.await;

        // Second run on a fresh worker, from history only.
        let second = FakeRuntime::healthy();
        let history = repo.load(KEY).await.unwrap();
        let replay = ReplayState::fold(&history).unwrap();
        assert_eq!(replay.in_flight, Some(OrderStep::Brew));
        let recorder = HistoryRecorder::new(Arc::clone(&repo), KEY, replay.recorded);
        let resumed = resume(&second, Arc::clone(&repo), replay, recorder);

        let result = resumed.workflow.run().await;

        assert_eq!(result.status, OrderStatus::Completed);
        assert_eq!(result.amount_cents, 525);
        assert_eq!(second.payment.calls(), 0);
        assert_eq!(second.brewer.calls(), 1);
        assert_eq!(second.notifier.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_with_pending_cancel_still_finishes_in_flight_step() {
        let brewer = FakeBrewer::new().blocked();
        let first = FakeRuntime::new(FakePayment::new(), brewer.clone(), FakeNotifier::new());
        let h = harness(&first, latte()).await;
        let repo = Arc::clone(&h.repo);
        let signals = h.signals.clone();
        let task = tokio::spawn(h.workflow.run());
        brewer.wait_for_calls(1).await;
        send_cancel(&signals).await.unwrap();
        task.abort();
        let _ = task.await;

        let second = FakeRuntime::healthy();
        let replay = ReplayState::fold(&repo.load(KEY).await.unwrap()).unwrap();
        let recorder = HistoryRecorder::new(Arc::clone(&repo), KEY, replay.recorded);
        let result = resume(&second, Arc::clone(&repo), replay, recorder).workflow.run().await;

        assert_eq!(result.status, OrderStatus::Cancelled);
        assert!(result.charged && result.brewed);
        assert!(!result.receipt_sent);
        assert_eq!(second.notifier.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pricing_mismatch_on_replay_fails_the_order() {
        let fakes = FakeRuntime::healthy();
        let repo = Arc::new(InMemoryHistoryRepository::new());
        let mut recorder = HistoryRecorder::new(Arc::clone(&repo), KEY, 0);
        recorder
            .record(HistoryEvent::WorkflowStarted {
                run_id: Uuid::now_v7(),
                workflow_type: ORDER_WORKFLOW_TYPE.to_string(),
                task_queue: "coffee-orders".to_string(),
                request: latte(),
            })
            .await
            .unwrap();
        recorder
            .record(HistoryEvent::OrderPriced { amount_cents: 999 })
            .await
            .unwrap();

        let replay = ReplayState::fold(&repo.load(KEY).await.unwrap()).unwrap();
        let recorder = HistoryRecorder::new(Arc::clone(&repo), KEY, replay.recorded);
        let result = resume(&fakes, Arc::clone(&repo), replay, recorder).workflow.run().await;

        assert_eq!(result.status, OrderStatus::Failed);
        assert_eq!(fakes.payment.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_history_returns_recorded_result() {
        let fakes = FakeRuntime::healthy();
        let h = harness(&fakes, latte()).await;
        let repo = Arc::clone(&h.repo);
        let first = h.workflow.run().await;

        let replay = ReplayState::fold(&repo.load(KEY).await.unwrap()).unwrap();
        let recorder = HistoryRecorder::new(Arc::clone(&repo), KEY, replay.recorded);
        let again = resume(&fakes, Arc::clone(&repo), replay, recorder).workflow.run().await;

        assert_eq!(again, first);
        assert_eq!(fakes.payment.calls(), 1);
    }
}
