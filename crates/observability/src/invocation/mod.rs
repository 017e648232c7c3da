//! Service-method invocation logging.
//!
//! A method opts in by being registered with [`Marker::Loggable`] and living
//! under one of the configured module scopes. Registration happens once, when
//! the owning service is built, and yields an [`Interceptor`]:
//!
//! ```text
//! InvocationPolicy::register(signature, marker)
//!   ↓ (scope ∧ marker, evaluated once)
//! Interceptor ── eligible ──▶ enteringMethod → body → leavingMethod | leavingMethodException
//!             └─ otherwise ─▶ body (no records)
//! ```
//!
//! Records go to the `forgeerp_observability::invocation` target at `DEBUG`.
//! Arguments, return values and errors pass through untouched.

mod interceptor;
mod observer;
mod scope;
mod signature;

pub use interceptor::{InvocationPolicy, Interceptor, Marker};
pub use observer::{InvocationContext, InvocationObserver, failure_reason};
pub use scope::ScopeFilter;
pub use signature::MethodSignature;

/// Logger name for every invocation record.
pub const LOG_TARGET: &str = "forgeerp_observability::invocation";
