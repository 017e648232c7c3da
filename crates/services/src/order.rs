//! Order processing service.

use thiserror::Error;
use uuid::Uuid;

use forgeerp_observability::{
    Interceptor, InvocationPolicy, Marker, MethodSignature, checked_method_signature,
};

const PROCESS: MethodSignature = checked_method_signature!(OrderService::process);
const QUOTE: MethodSignature = checked_method_signature!(OrderService::quote);

/// Order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct OrderId(Uuid);

impl OrderId {
    /// Uses UUIDv7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Order line: quantity and unit price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub quantity: u32,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub lines: Vec<OrderLine>,
}

impl Order {
    pub fn new(lines: Vec<OrderLine>) -> Self {
        Self {
            id: OrderId::new(),
            lines,
        }
    }

    /// Sum of `quantity * unit_price`; `None` on overflow.
    pub fn total(&self) -> Option<u64> {
        self.lines.iter().try_fold(0_u64, |acc, line| {
            line.unit_price
                .checked_mul(u64::from(line.quantity))
                .and_then(|amount| acc.checked_add(amount))
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("order {0} has no lines")]
    Empty(OrderId),

    #[error("line {line_no} has zero quantity")]
    ZeroQuantity { line_no: usize },

    #[error("order total overflows")]
    Overflow,
}

#[derive(Debug, Clone)]
pub struct OrderService {
    process: Interceptor,
    quote: Interceptor,
}

impl OrderService {
    pub fn new(policy: &InvocationPolicy) -> Self {
        Self {
            process: policy.register(PROCESS, Marker::Loggable),
            quote: policy.register(QUOTE, Marker::Unmarked),
        }
    }

    /// Validate an order and return its total.
    pub fn process(&self, order: &Order) -> Result<u64, OrderError> {
        self.process.invoke(|| {
            if order.lines.is_empty() {
                return Err(OrderError::Empty(order.id));
            }
            if let Some(line_no) = order.lines.iter().position(|l| l.quantity == 0) {
                return Err(OrderError::ZeroQuantity { line_no: line_no + 1 });
            }
            order.total().ok_or(OrderError::Overflow)
        })
    }

    /// Best-effort total for display; saturates instead of failing.
    pub fn quote(&self, order: &Order) -> u64 {
        self.quote.invoke_infallible(|| order.total().unwrap_or(u64::MAX))
    }
}
