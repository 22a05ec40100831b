//! Deterministic fake services for unit tests.
//!
//! One `FakeService` implements all three service traits; the aliases only
//! make test setup read naturally. Behavior is shared through an `Arc`, so a
//! test keeps a clone to script failures, release blocked calls, and inspect
//! call counts after handing the fake to the workflow.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use brewline_types::error::ServiceError;
use brewline_types::order::{BrewInput, ChargeInput, ReceiptInput};
use tokio::sync::watch;

use crate::pricing::StandardPricing;
use crate::service::{BrewService, NotificationService, PaymentService};
use crate::workflow::OrderRuntime;
use crate::workflow::activities::OrderActivities;
use brewline_types::retry::RetryPolicy;

pub type FakePayment = FakeService;
pub type FakeBrewer = FakeService;
pub type FakeNotifier = FakeService;

struct Behavior {
    calls: AtomicU32,
    fail_first: AtomicU32,
    always_fail: AtomicBool,
    report_false: AtomicBool,
    latency_ms: AtomicU64,
    gated: AtomicBool,
    gate: watch::Sender<bool>,
    receipts: Mutex<Vec<ReceiptInput>>,
}

#[derive(Clone)]
pub struct FakeService {
    behavior: Arc<Behavior>,
}

impl FakeService {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(false);
        Self {
            behavior: Arc::new(Behavior {
                calls: AtomicU32::new(0),
                fail_first: AtomicU32::new(0),
                always_fail: AtomicBool::new(false),
                report_false: AtomicBool::new(false),
                latency_ms: AtomicU64::new(0),
                gated: AtomicBool::new(false),
                gate,
                receipts: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Fail the first `n` calls with a transient error.
    pub fn failing_first(self, n: u32) -> Self {
        self.behavior.fail_first.store(n, Ordering::SeqCst);
        self
    }

    pub fn always_failing(self) -> Self {
        self.behavior.always_fail.store(true, Ordering::SeqCst);
        self
    }

    /// Return `Ok(false)` instead of succeeding.
    pub fn reporting_false(self) -> Self {
        self.behavior.report_false.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        self.behavior
            .latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
        self
    }

    /// Block every call until [`FakeService::release`] is invoked.
    pub fn blocked(self) -> Self {
        self.behavior.gated.store(true, Ordering::SeqCst);
        self
    }

    pub fn release(&self) {
        self.behavior.gate.send_replace(true);
    }

    pub fn calls(&self) -> u32 {
        self.behavior.calls.load(Ordering::SeqCst)
    }

    pub fn receipts(&self) -> Vec<ReceiptInput> {
        self.behavior
            .receipts
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Sleep on the (paused) test clock until at least `n` calls started.
    pub async fn wait_for_calls(&self, n: u32) {
        while self.calls() < n {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    async fn invoke(&self) -> Result<bool, ServiceError> {
        let call = self.behavior.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if self.behavior.gated.load(Ordering::SeqCst) {
            let mut open = self.behavior.gate.subscribe();
            let _ = open.wait_for(|released| *released).await;
        }

        let latency = self.behavior.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if self.behavior.always_fail.load(Ordering::SeqCst)
            || call <= self.behavior.fail_first.load(Ordering::SeqCst)
        {
            return Err(ServiceError::Transient(format!("scripted failure on call {call}")));
        }
        Ok(!self.behavior.report_false.load(Ordering::SeqCst))
    }
}

impl PaymentService for FakeService {
    async fn charge(&self, _input: &ChargeInput) -> Result<bool, ServiceError> {
        self.invoke().await
    }
}

impl BrewService for FakeService {
    async fn brew(&self, _input: &BrewInput) -> Result<bool, ServiceError> {
        self.invoke().await
    }
}

impl NotificationService for FakeService {
    async fn notify(&self, input: &ReceiptInput) -> Result<bool, ServiceError> {
        let outcome = self.invoke().await;
        if matches!(outcome, Ok(true)) {
            if let Ok(mut receipts) = self.behavior.receipts.lock() {
                receipts.push(input.clone());
            }
        }
        outcome
    }
}

/// Fakes wired into a runtime with standard pricing and the reference
/// retry policy.
pub struct FakeRuntime {
    pub payment: FakePayment,
    pub brewer: FakeBrewer,
    pub notifier: FakeNotifier,
    pub runtime: OrderRuntime,
}

impl FakeRuntime {
    pub fn new(payment: FakePayment, brewer: FakeBrewer, notifier: FakeNotifier) -> Self {
        let activities = OrderActivities::new(payment.clone(), brewer.clone(), notifier.clone());
        Self {
            runtime: OrderRuntime::new(activities, StandardPricing::default(), RetryPolicy::default()),
            payment,
            brewer,
            notifier,
        }
    }

    pub fn healthy() -> Self {
        Self::new(FakePayment::new(), FakeBrewer::new(), FakeNotifier::new())
    }
}
