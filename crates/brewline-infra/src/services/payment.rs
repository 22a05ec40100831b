use std::time::Duration;

use brewline_core::service::PaymentService;
use brewline_types::error::ServiceError;
use brewline_types::order::ChargeInput;
use dashmap::DashMap;

/// Payment processor stand-in. Always succeeds after its latency.
pub struct SimulatedPaymentService {
    latency: Duration,
    /// Captured amount per order id.
    captured: DashMap<String, i64>,
}

impl SimulatedPaymentService {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            captured: DashMap::new(),
        }
    }

    pub fn captured(&self, order_id: &str) -> Option<i64> {
        self.captured.get(order_id).map(|amount| *amount)
    }
}

impl PaymentService for SimulatedPaymentService {
    async fn charge(&self, input: &ChargeInput) -> Result<bool, ServiceError> {
        if let Some(amount) = self.captured(&input.order_id) {
            tracing::info!(order_id = %input.order_id, amount_cents = amount, "charge already captured");
            return Ok(true);
        }

        tokio::time::sleep(self.latency).await;
        self.captured
            .entry(input.order_id.clone())
            .or_insert(input.amount_cents);
        tracing::info!(order_id = %input.order_id, amount_cents = input.amount_cents, "charged customer");
        Ok(true)
    }
}
