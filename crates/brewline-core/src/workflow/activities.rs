//! Activities: the three side-effecting steps of an order.
//!
//! Each activity validates its input, calls the injected service, and turns a
//! `false` return into an error so the step executor treats it as a failed
//! attempt.

use brewline_types::error::ServiceError;
use brewline_types::history::OrderStep;
use brewline_types::order::{BrewInput, ChargeInput, OrderRequest, ReceiptInput};

use crate::service::boxed::{BoxBrewService, BoxNotificationService, BoxPaymentService};
use crate::service::{BrewService, NotificationService, PaymentService};

/// Activity type names a worker must register for the order workflow.
pub const ACTIVITY_TYPES: [&str; 3] = ["charge_customer", "brew_coffee", "send_receipt"];

/// The order's side-effect services, constructed once per worker.
pub struct OrderActivities {
    payment: BoxPaymentService,
    brewer: BoxBrewService,
    notifier: BoxNotificationService,
}

impl OrderActivities {
    pub fn new<P, B, N>(payment: P, brewer: B, notifier: N) -> Self
    where
        P: PaymentService + 'static,
        B: BrewService + 'static,
        N: NotificationService + 'static,
    {
        Self {
            payment: BoxPaymentService::new(payment),
            brewer: BoxBrewService::new(brewer),
            notifier: BoxNotificationService::new(notifier),
        }
    }

    pub async fn charge_customer(&self, input: &ChargeInput) -> Result<(), ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::Rejected(e.to_string()))?;
        tracing::info!(order_id = %input.order_id, amount_cents = input.amount_cents, "charging customer");
        expect_success("charge", self.payment.charge(input).await)
    }

    pub async fn brew_coffee(&self, input: &BrewInput) -> Result<(), ServiceError> {
        tracing::info!(order_id = %input.order_id, drink = %input.drink, size = %input.size, "brewing");
        expect_success("brew", self.brewer.brew(input).await)
    }

    pub async fn send_receipt(&self, input: &ReceiptInput) -> Result<(), ServiceError> {
        tracing::info!(order_id = %input.order_id, "sending receipt");
        expect_success("notify", self.notifier.notify(input).await)
    }

    /// Run the activity behind `step` for `request`.
    pub async fn run_step(
        &self,
        step: OrderStep,
        request: &OrderRequest,
        amount_cents: i64,
    ) -> Result<(), ServiceError> {
        match step {
            OrderStep::Charge => {
                self.charge_customer(&ChargeInput {
                    order_id: request.order_id.clone(),
                    amount_cents,
                })
                .await
            }
            OrderStep::Brew => {
                self.brew_coffee(&BrewInput {
                    order_id: request.order_id.clone(),
                    drink: request.drink,
                    size: request.size,
                })
                .await
            }
            OrderStep::Notify => {
                self.send_receipt(&ReceiptInput {
                    order_id: request.order_id.clone(),
                    summary: Some(format!(
                        "{} {} ({} cents)",
                        request.size, request.drink, amount_cents
                    )),
                })
                .await
            }
        }
    }
}

fn expect_success(
    operation: &str,
    outcome: Result<bool, ServiceError>,
) -> Result<(), ServiceError> {
    match outcome? {
        true => Ok(()),
        false => Err(ServiceError::Rejected(format!("{operation} reported failure"))),
    }
}
