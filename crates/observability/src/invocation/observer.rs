use core::{
    any::Any,
    fmt::{self, Write as _},
};
use std::panic::{self, AssertUnwindSafe};

use tracing::debug;

use super::{LOG_TARGET, MethodSignature};

/// Per-invocation record handed to the log sink.
///
/// Lives only for the duration of one logging call; `reason` is set on the
/// failure path only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationContext<'a> {
    pub signature: &'a MethodSignature,
    pub reason: Option<String>,
}

impl<'a> InvocationContext<'a> {
    pub fn new(signature: &'a MethodSignature) -> Self {
        Self {
            signature,
            reason: None,
        }
    }

    pub fn failed(signature: &'a MethodSignature, reason: String) -> Self {
        Self {
            signature,
            reason: Some(reason),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.signature.type_name()
    }

    pub fn method_name(&self) -> &'static str {
        self.signature.method_name()
    }

    /// Failure reason, empty when absent.
    pub fn reason(&self) -> &str {
        self.reason.as_deref().unwrap_or_default()
    }
}

/// Emits the entry/success/failure records for one intercepted method.
///
/// Stateless: every call reads only its arguments, so one observer can
/// serve any number of concurrent invocations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvocationObserver;

impl InvocationObserver {
    /// `enteringMethod {type}::{method}`
    pub fn on_entry(&self, signature: &MethodSignature) {
        let cx = InvocationContext::new(signature);
        emit(|| {
            debug!(
                target: LOG_TARGET,
                type_name = cx.type_name(),
                method = cx.method_name(),
                "enteringMethod {}::{}",
                cx.type_name(),
                cx.method_name()
            )
        });
    }

    /// `leavingMethod {type}::{method}`. The return value is not logged.
    pub fn on_success<T: ?Sized>(&self, signature: &MethodSignature, _return_value: &T) {
        let cx = InvocationContext::new(signature);
        emit(|| {
            debug!(
                target: LOG_TARGET,
                type_name = cx.type_name(),
                method = cx.method_name(),
                "leavingMethod {}::{}",
                cx.type_name(),
                cx.method_name()
            )
        });
    }

    /// `leavingMethodException {type}::{method}. Reason: {reason}`
    pub fn on_failure<E>(&self, signature: &MethodSignature, error: &E)
    where
        E: fmt::Display + ?Sized,
    {
        self.emit_failure(&InvocationContext::failed(signature, failure_reason(error)));
    }

    pub(crate) fn on_panic(&self, signature: &MethodSignature, payload: &(dyn Any + Send)) {
        self.emit_failure(&InvocationContext::failed(signature, panic_reason(payload)));
    }

    pub(crate) fn on_cancel(&self, signature: &MethodSignature) {
        self.emit_failure(&InvocationContext::failed(signature, "cancelled".to_string()));
    }

    fn emit_failure(&self, cx: &InvocationContext<'_>) {
        emit(|| {
            debug!(
                target: LOG_TARGET,
                type_name = cx.type_name(),
                method = cx.method_name(),
                reason = cx.reason(),
                "leavingMethodException {}::{}. Reason: {}",
                cx.type_name(),
                cx.method_name(),
                cx.reason()
            )
        });
    }
}

/// Hand one record to the subscriber. A panicking sink loses the record and
/// nothing else: the intercepted call keeps its outcome.
fn emit(record: impl FnOnce()) {
    let _ = panic::catch_unwind(AssertUnwindSafe(record));
}

/// Human-readable reason for an error: its `Display` text.
///
/// An error without a message yields an empty string. A `Display` impl that
/// fails or panics also yields an empty string.
pub fn failure_reason<E>(error: &E) -> String
where
    E: fmt::Display + ?Sized,
{
    let mut reason = String::new();
    match panic::catch_unwind(AssertUnwindSafe(|| write!(reason, "{error}"))) {
        Ok(Ok(())) => reason,
        _ => String::new(),
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        String::new()
    }
}
