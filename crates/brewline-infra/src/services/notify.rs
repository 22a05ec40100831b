use std::time::Duration;

use brewline_core::service::NotificationService;
use brewline_types::error::ServiceError;
use brewline_types::order::ReceiptInput;
use dashmap::DashMap;

/// Receipt sender stand-in. Always succeeds after its latency.
pub struct SimulatedNotificationService {
    latency: Duration,
    sent: DashMap<String, Option<String>>,
}

impl SimulatedNotificationService {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            sent: DashMap::new(),
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.len()
    }
}

impl NotificationService for SimulatedNotificationService {
    async fn notify(&self, input: &ReceiptInput) -> Result<bool, ServiceError> {
        if self.sent.contains_key(&input.order_id) {
            tracing::info!(order_id = %input.order_id, "receipt already sent");
            return Ok(true);
        }

        tokio::time::sleep(self.latency).await;
        self.sent.insert(input.order_id.clone(), input.summary.clone());
        tracing::info!(
            order_id = %input.order_id,
            summary = input.summary.as_deref().unwrap_or(""),
            "receipt sent"
        );
        Ok(true)
    }
}
