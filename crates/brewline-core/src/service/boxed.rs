//! Boxed service wrappers -- object-safe dynamic dispatch for the
//! side-effect service traits.
//!
//! Same blanket-impl pattern for each trait:
//! 1. Define an object-safe `*Dyn` trait with boxed futures
//! 2. Blanket-impl it for every implementor of the RPITIT trait
//! 3. A `Box*` struct wraps `Box<dyn *Dyn>` and delegates

use brewline_types::error::ServiceError;
use brewline_types::order::{BrewInput, ChargeInput, ReceiptInput};

use futures_util::future::BoxFuture;

use super::{BrewService, NotificationService, PaymentService};

type ServiceFuture<'a> = BoxFuture<'a, Result<bool, ServiceError>>;

// ---------------------------------------------------------------------------
// Payment
// ---------------------------------------------------------------------------

/// Object-safe version of [`PaymentService`].
pub trait PaymentServiceDyn: Send + Sync {
    fn charge_boxed<'a>(&'a self, input: &'a ChargeInput) -> ServiceFuture<'a>;
}

impl<T: PaymentService> PaymentServiceDyn for T {
    fn charge_boxed<'a>(&'a self, input: &'a ChargeInput) -> ServiceFuture<'a> {
        Box::pin(self.charge(input))
    }
}

/// Type-erased payment service, chosen at worker startup.
pub struct BoxPaymentService {
    inner: Box<dyn PaymentServiceDyn + Send + Sync>,
}

impl BoxPaymentService {
    pub fn new<T: PaymentService + 'static>(service: T) -> Self {
        Self {
            inner: Box::new(service),
        }
    }

    pub async fn charge(&self, input: &ChargeInput) -> Result<bool, ServiceError> {
        self.inner.charge_boxed(input).await
    }
}

// ---------------------------------------------------------------------------
// Brew
// ---------------------------------------------------------------------------

/// Object-safe version of [`BrewService`].
pub trait BrewServiceDyn: Send + Sync {
    fn brew_boxed<'a>(&'a self, input: &'a BrewInput) -> ServiceFuture<'a>;
}

impl<T: BrewService> BrewServiceDyn for T {
    fn brew_boxed<'a>(&'a self, input: &'a BrewInput) -> ServiceFuture<'a> {
        Box::pin(self.brew(input))
    }
}

/// Type-erased brew service.
pub struct BoxBrewService {
    inner: Box<dyn BrewServiceDyn + Send + Sync>,
}

impl BoxBrewService {
    pub fn new<T: BrewService + 'static>(service: T) -> Self {
        Self {
            inner: Box::new(service),
        }
    }

    pub async fn brew(&self, input: &BrewInput) -> Result<bool, ServiceError> {
        self.inner.brew_boxed(input).await
    }
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// Object-safe version of [`NotificationService`].
pub trait NotificationServiceDyn: Send + Sync {
    fn notify_boxed<'a>(&'a self, input: &'a ReceiptInput) -> ServiceFuture<'a>;
}

impl<T: NotificationService> NotificationServiceDyn for T {
    fn notify_boxed<'a>(&'a self, input: &'a ReceiptInput) -> ServiceFuture<'a> {
        Box::pin(self.notify(input))
    }
}

/// Type-erased notification service.
pub struct BoxNotificationService {
    inner: Box<dyn NotificationServiceDyn + Send + Sync>,
}

impl BoxNotificationService {
    pub fn new<T: NotificationService + 'static>(service: T) -> Self {
        Self {
            inner: Box::new(service),
        }
    }

    pub async fn notify(&self, input: &ReceiptInput) -> Result<bool, ServiceError> {
        self.inner.notify_boxed(input).await
    }
}
