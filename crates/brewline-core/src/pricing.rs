//! Pricing policies.
//!
//! A pricing policy maps an order to a price in cents. Policies must be pure:
//! the workflow re-evaluates the price on every replay and compares it with
//! the recorded value, so wall-clock reads or unseeded randomness here turn
//! into non-determinism faults.

use brewline_types::order::{Drink, DrinkSize, OrderRequest};

/// Capability: compute the price of an order.
///
/// Any `Fn(&OrderRequest) -> i64` closure is a policy, so alternate pricing
/// can be passed straight into the worker's runtime.
pub trait PricingPolicy: Send + Sync {
    fn price_cents(&self, request: &OrderRequest) -> i64;
}

impl<F> PricingPolicy for F
where
    F: Fn(&OrderRequest) -> i64 + Send + Sync,
{
    fn price_cents(&self, request: &OrderRequest) -> i64 {
        self(request)
    }
}

/// Default pricing: a base price per size plus a flat surcharge for milk
/// drinks whose name contains one of the surcharge keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardPricing {
    pub small_cents: i64,
    pub medium_cents: i64,
    pub large_cents: i64,
    pub surcharge_cents: i64,
    /// Lowercase substrings matched against the drink name.
    pub surcharge_keywords: Vec<String>,
}

impl Default for StandardPricing {
    fn default() -> Self {
        Self {
            small_cents: 300,
            medium_cents: 450,
            large_cents: 600,
            surcharge_cents: 75,
            surcharge_keywords: vec!["latte".to_string(), "mocha".to_string()],
        }
    }
}

impl StandardPricing {
    pub fn base_price(&self, size: DrinkSize) -> i64 {
        match size {
            DrinkSize::S => self.small_cents,
            DrinkSize::M => self.medium_cents,
            DrinkSize::L => self.large_cents,
        }
    }

    pub fn surcharge(&self, drink: Drink) -> i64 {
        let name = drink.as_str().to_ascii_lowercase();
        if self
            .surcharge_keywords
            .iter()
            .any(|keyword| name.contains(keyword.as_str()))
        {
            self.surcharge_cents
        } else {
            0
        }
    }
}

impl PricingPolicy for StandardPricing {
    fn price_cents(&self, request: &OrderRequest) -> i64 {
        self.base_price(request.size) + self.surcharge(request.drink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn order(drink: Drink, size: DrinkSize) -> OrderRequest {
        OrderRequest::new("o-1", drink, size)
    }

    #[test]
    fn test_latte_medium_is_525() {
        let pricing = StandardPricing::default();
        assert_eq!(pricing.price_cents(&order(Drink::Latte, DrinkSize::M)), 525);
    }

    #[test]
    fn test_plain_drinks_pay_base_price_only() {
        let pricing = StandardPricing::default();
        assert_eq!(pricing.price_cents(&order(Drink::Espresso, DrinkSize::S)), 300);
        assert_eq!(pricing.price_cents(&order(Drink::Americano, DrinkSize::L)), 600);
        assert_eq!(pricing.price_cents(&order(Drink::FlatWhite, DrinkSize::M)), 450);
    }

    #[test]
    fn test_surcharge_matches_keyword_variants() {
        let pricing = StandardPricing::default();
        assert_eq!(pricing.surcharge(Drink::IcedLatte), 75);
        assert_eq!(pricing.surcharge(Drink::WhiteMocha), 75);
        assert_eq!(pricing.surcharge(Drink::Cappuccino), 0);
    }

    #[test]
    fn test_closure_is_a_policy() {
        let flat = |_: &OrderRequest| 100_i64;
        assert_eq!(flat.price_cents(&order(Drink::Mocha, DrinkSize::L)), 100);

        let boxed: Box<dyn PricingPolicy> = Box::new(flat);
        assert_eq!(boxed.price_cents(&order(Drink::Espresso, DrinkSize::S)), 100);
    }

    fn any_drink() -> impl Strategy<Value = Drink> {
        proptest::sample::select(Drink::ALL.to_vec())
    }

    fn any_size() -> impl Strategy<Value = DrinkSize> {
        prop_oneof![Just(DrinkSize::S), Just(DrinkSize::M), Just(DrinkSize::L)]
    }

    proptest! {
        #[test]
        fn test_price_depends_only_on_drink_and_size(
            drink in any_drink(),
            size in any_size(),
            id_a in "[a-z0-9-]{1,16}",
            id_b in "[a-z0-9-]{1,16}",
        ) {
            let pricing = StandardPricing::default();
            let first = pricing.price_cents(&OrderRequest::new(id_a.clone(), drink, size));
            let again = pricing.price_cents(&OrderRequest::new(id_a, drink, size));
            let other_id = pricing.price_cents(&OrderRequest::new(id_b, drink, size));
            prop_assert_eq!(first, again);
            prop_assert_eq!(first, other_id);
            prop_assert!(first >= 300);
        }
    }
}
