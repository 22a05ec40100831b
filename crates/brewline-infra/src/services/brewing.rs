use std::sync::Mutex;
use std::time::Duration;

use brewline_core::service::BrewService;
use brewline_types::error::ServiceError;
use brewline_types::order::BrewInput;
use dashmap::DashSet;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Espresso machine stand-in. Each attempt fails independently with
/// probability `failure_rate`.
pub struct SimulatedBrewService {
    latency: Duration,
    failure_rate: f64,
    rng: Mutex<StdRng>,
    brewed: DashSet<String>,
}

impl SimulatedBrewService {
    pub fn new(latency: Duration, failure_rate: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            latency,
            failure_rate: failure_rate.clamp(0.0, 1.0),
            rng: Mutex::new(rng),
            brewed: DashSet::new(),
        }
    }

    fn roll_failure(&self) -> bool {
        match self.rng.lock() {
            Ok(mut rng) => rng.gen_bool(self.failure_rate),
            Err(poisoned) => poisoned.into_inner().gen_bool(self.failure_rate),
        }
    }
}

impl BrewService for SimulatedBrewService {
    async fn brew(&self, input: &BrewInput) -> Result<bool, ServiceError> {
        if self.brewed.contains(&input.order_id) {
            tracing::info!(order_id = %input.order_id, "drink already brewed");
            return Ok(true);
        }

        tokio::time::sleep(self.latency).await;

        if self.roll_failure() {
            tracing::warn!(order_id = %input.order_id, drink = %input.drink, "brew machine jammed");
            return Err(ServiceError::Transient(format!(
                "brew machine jammed while making {} {}",
                input.size, input.drink
            )));
        }

        self.brewed.insert(input.order_id.clone());
        tracing::info!(order_id = %input.order_id, drink = %input.drink, size = %input.size, "brewed");
        Ok(true)
    }
}
