//! Side-effect service traits (ports).
//!
//! Charging, brewing, and sending receipts are the only operations in an
//! order with real-world effects. Each is a single call that may be slow or
//! fail transiently; the step executor retries them. Implementations must
//! tolerate being invoked more than once for the same order id, because a
//! retry or a crash recovery may re-run a call whose effect already landed.
//!
//! Implementations live in brewline-infra (e.g., `SimulatedBrewService`).

pub mod boxed;

use brewline_types::error::ServiceError;
use brewline_types::order::{BrewInput, ChargeInput, ReceiptInput};

/// Charges the customer for an order.
pub trait PaymentService: Send + Sync {
    /// Returns `Ok(true)` once the charge is captured.
    fn charge(
        &self,
        input: &ChargeInput,
    ) -> impl std::future::Future<Output = Result<bool, ServiceError>> + Send;
}

/// Prepares the drink.
pub trait BrewService: Send + Sync {
    /// Returns `Ok(true)` once the drink is ready.
    fn brew(
        &self,
        input: &BrewInput,
    ) -> impl std::future::Future<Output = Result<bool, ServiceError>> + Send;
}

/// Delivers the receipt to the customer.
pub trait NotificationService: Send + Sync {
    fn notify(
        &self,
        input: &ReceiptInput,
    ) -> impl std::future::Future<Output = Result<bool, ServiceError>> + Send;
}
