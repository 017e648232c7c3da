//! Application services (order processing, payments, reporting).
//!
//! Every service registers its methods with an [`InvocationPolicy`] when it is
//! built; methods marked loggable emit `enteringMethod` / `leavingMethod` /
//! `leavingMethodException` records at `DEBUG` when their module is in scope.

pub mod order;
pub mod payment;
pub mod reporting;

use forgeerp_observability::{ConfigError, InvocationPolicy, ObservabilityConfig};

pub use order::{Order, OrderError, OrderId, OrderLine, OrderService};
pub use payment::{Card, PaymentError, PaymentService, Receipt};
pub use reporting::ReportingService;

/// All services, wired against one invocation policy.
#[derive(Debug, Clone)]
pub struct ServiceLayer {
    pub orders: OrderService,
    pub payments: PaymentService,
    pub reporting: ReportingService,
}

impl ServiceLayer {
    pub fn new(policy: &InvocationPolicy) -> Self {
        Self {
            orders: OrderService::new(policy),
            payments: PaymentService::new(policy),
            reporting: ReportingService::new(policy),
        }
    }

    /// Build with the `logged_scopes` of an observability config.
    pub fn from_config(config: &ObservabilityConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(&InvocationPolicy::from_config(config)?))
    }
}
