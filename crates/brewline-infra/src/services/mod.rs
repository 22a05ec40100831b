//! Simulated side-effect services.
//!
//! Each service sleeps for a configured latency to model a slow external
//! system. Brewing additionally fails at random. All three remember which
//! orders they already handled, so a retried or replayed call for the same
//! order id does not repeat the effect.

pub mod brewing;
pub mod notify;
pub mod payment;

use std::time::Duration;

use brewline_core::pricing::PricingPolicy;
use brewline_core::workflow::OrderRuntime;
use brewline_core::workflow::activities::OrderActivities;
use brewline_types::config::BrewlineConfig;

pub use brewing::SimulatedBrewService;
pub use notify::SimulatedNotificationService;
pub use payment::SimulatedPaymentService;

/// Build every service once and wire them into an order runtime.
///
/// `seed` makes brew failures reproducible.
pub fn build_runtime(
    config: &BrewlineConfig,
    pricing: impl PricingPolicy + 'static,
    seed: Option<u64>,
) -> OrderRuntime {
    let services = &config.services;
    let payment = SimulatedPaymentService::new(Duration::from_millis(services.charge_latency_ms));
    let brewer = SimulatedBrewService::new(
        Duration::from_millis(services.brew_latency_ms),
        services.brew_failure_rate,
        seed,
    );
    let notifier =
        SimulatedNotificationService::new(Duration::from_millis(services.notify_latency_ms));

    tracing::debug!(
        charge_latency_ms = services.charge_latency_ms,
        brew_latency_ms = services.brew_latency_ms,
        brew_failure_rate = services.brew_failure_rate,
        notify_latency_ms = services.notify_latency_ms,
        "built simulated services"
    );

    OrderRuntime::new(
        OrderActivities::new(payment, brewer, notifier),
        pricing,
        config.retry.clone(),
    )
}
