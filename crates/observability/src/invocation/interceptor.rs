use core::{fmt, future::Future, task::Poll};
use std::{
    future::poll_fn,
    panic::{self, AssertUnwindSafe},
    pin::pin,
};

use crate::config::{ConfigError, ObservabilityConfig};

use super::{InvocationObserver, MethodSignature, ScopeFilter};

/// Opt-in designation for invocation logging. Methods are unmarked unless
/// registered otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Marker {
    #[default]
    Unmarked,
    Loggable,
}

/// Eligibility rules: which registered methods get an active [`Interceptor`].
///
/// A method is eligible when it is marked [`Marker::Loggable`] and its
/// declaring module is inside the [`ScopeFilter`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationPolicy {
    scope: ScopeFilter,
}

impl InvocationPolicy {
    pub fn new(scope: ScopeFilter) -> Self {
        Self { scope }
    }

    pub fn from_config(config: &ObservabilityConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(ScopeFilter::prefixes(config.logged_scopes.iter().cloned())?))
    }

    pub fn scope(&self) -> &ScopeFilter {
        &self.scope
    }

    pub fn is_eligible(&self, signature: &MethodSignature, marker: Marker) -> bool {
        marker == Marker::Loggable && self.scope.contains(signature.module_path())
    }

    /// Resolve eligibility once and hand back the wrapper for this method.
    pub fn register(&self, signature: MethodSignature, marker: Marker) -> Interceptor {
        if self.is_eligible(&signature, marker) {
            Interceptor {
                signature,
                observer: Some(InvocationObserver),
            }
        } else {
            Interceptor::passthrough(signature)
        }
    }
}

/// Wraps calls to one method with entry and exit records.
///
/// Exactly one exit record follows every entry record:
///
/// | exit                      | record                                     |
/// |---------------------------|--------------------------------------------|
/// | `Ok` / plain return       | `leavingMethod`                            |
/// | `Err(e)`                  | `leavingMethodException`, reason = `e`     |
/// | panic                     | `leavingMethodException`, reason = payload |
/// | async call dropped early  | `leavingMethodException`, reason = `cancelled` |
///
/// Return values, errors and panics reach the caller unchanged. An inactive
/// interceptor only calls through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interceptor {
    signature: MethodSignature,
    observer: Option<InvocationObserver>,
}

impl Interceptor {
    /// An interceptor that never logs.
    pub fn passthrough(signature: MethodSignature) -> Self {
        Self {
            signature,
            observer: None,
        }
    }

    pub fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    pub fn is_active(&self) -> bool {
        self.observer.is_some()
    }

    pub fn invoke<T, E, F>(&self, call: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: fmt::Display,
    {
        let Some(observer) = self.observer else {
            return call();
        };

        observer.on_entry(&self.signature);
        let outcome = self.run_sync(observer, call);
        match &outcome {
            Ok(value) => observer.on_success(&self.signature, value),
            Err(error) => observer.on_failure(&self.signature, error),
        }
        outcome
    }

    /// For methods that cannot fail (including unit returns).
    pub fn invoke_infallible<T, F>(&self, call: F) -> T
    where
        F: FnOnce() -> T,
    {
        let Some(observer) = self.observer else {
            return call();
        };

        observer.on_entry(&self.signature);
        let value = self.run_sync(observer, call);
        observer.on_success(&self.signature, &value);
        value
    }

    /// Async counterpart of [`invoke`](Self::invoke).
    ///
    /// The entry record is emitted on first poll. Dropping the returned
    /// future after that and before completion emits a `cancelled` failure.
    pub async fn invoke_async<T, E, Fut>(&self, call: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let Some(observer) = self.observer else {
            return call.await;
        };

        observer.on_entry(&self.signature);
        let mut guard = CancelGuard {
            observer,
            signature: &self.signature,
            armed: true,
        };

        let mut call = pin!(call);
        let polled = poll_fn(|cx| {
            match panic::catch_unwind(AssertUnwindSafe(|| call.as_mut().poll(cx))) {
                Ok(Poll::Ready(outcome)) => Poll::Ready(Ok(outcome)),
                Ok(Poll::Pending) => Poll::Pending,
                Err(payload) => Poll::Ready(Err(payload)),
            }
        })
        .await;
        guard.armed = false;

        match polled {
            Ok(outcome) => {
                match &outcome {
                    Ok(value) => observer.on_success(&self.signature, value),
                    Err(error) => observer.on_failure(&self.signature, error),
                }
                outcome
            }
            Err(payload) => {
                observer.on_panic(&self.signature, &*payload);
                panic::resume_unwind(payload)
            }
        }
    }

    /// Decorate a callable. Several arguments travel as one tuple.
    pub fn wrap<A, T, E, F>(self, f: F) -> impl Fn(A) -> Result<T, E>
    where
        F: Fn(A) -> Result<T, E>,
        E: fmt::Display,
    {
        move |args| self.invoke(|| f(args))
    }

    fn run_sync<R>(&self, observer: InvocationObserver, call: impl FnOnce() -> R) -> R {
        match panic::catch_unwind(AssertUnwindSafe(call)) {
            Ok(value) => value,
            Err(payload) => {
                observer.on_panic(&self.signature, &*payload);
                panic::resume_unwind(payload)
            }
        }
    }
}

struct CancelGuard<'a> {
    observer: InvocationObserver,
    signature: &'a MethodSignature,
    armed: bool,
}

impl Drop for CancelGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.observer.on_cancel(self.signature);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, future::pending, thread, time::Duration};

    use proptest::prelude::*;

    use super::*;
    use crate::testing::LogCapture;

    const PROCESS: MethodSignature = crate::method_signature!(OrderService::process);
    const CHARGE: MethodSignature = crate::method_signature!(PaymentService::charge);

    fn policy() -> InvocationPolicy {
        InvocationPolicy::default()
    }

    #[derive(Debug, PartialEq, Eq)]
    struct Declined(String);

    impl fmt::Display for Declined {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    #[test]
    fn success_logs_entry_then_leaving() {
        let capture = LogCapture::install();
        let process = policy().register(PROCESS, Marker::Loggable);

        let result: Result<u32, Declined> = process.invoke(|| Ok(42));

        assert_eq!(result, Ok(42));
        assert_eq!(
            capture.messages(),
            vec!["enteringMethod OrderService::process", "leavingMethod OrderService::process"]
        );
    }

    #[test]
    fn failure_logs_entry_then_exception_and_returns_error() {
        let capture = LogCapture::install();
        let charge = policy().register(CHARGE, Marker::Loggable);

        let result: Result<(), Declined> = charge.invoke(|| Err(Declined("card declined".into())));

        assert_eq!(result, Err(Declined("card declined".into())));
        assert_eq!(
            capture.messages(),
            vec![
                "enteringMethod PaymentService::charge",
                "leavingMethodException PaymentService::charge. Reason: card declined",
            ]
        );
    }

    #[test]
    fn messageless_error_gives_empty_reason() {
        let capture = LogCapture::install();
        let charge = policy().register(CHARGE, Marker::Loggable);

        let _: Result<(), Declined> = charge.invoke(|| Err(Declined(String::new())));

        let messages = capture.messages();
        assert_eq!(messages[1], "leavingMethodException PaymentService::charge. Reason: ");
        assert!(!messages[1].contains("null"));
    }

    #[test]
    fn unmarked_method_is_silent() {
        let capture = LogCapture::install();
        let process = policy().register(PROCESS, Marker::Unmarked);

        assert!(!process.is_active());
        let result: Result<u32, Declined> = process.invoke(|| Ok(7));

        assert_eq!(result, Ok(7));
        assert!(capture.records().is_empty());
    }

    #[test]
    fn out_of_scope_method_is_silent() {
        let capture = LogCapture::install();
        let policy = InvocationPolicy::new(ScopeFilter::prefixes(["forgeerp_services"]).unwrap());
        let process = policy.register(PROCESS, Marker::Loggable);

        assert!(!process.is_active());
        let _: Result<u32, Declined> = process.invoke(|| Err(Declined("ignored".into())));

        assert!(capture.records().is_empty());
    }

    #[test]
    fn in_scope_marked_method_is_active() {
        let policy = InvocationPolicy::new(ScopeFilter::prefixes([module_path!()]).unwrap());
        assert!(policy.register(PROCESS, Marker::Loggable).is_active());
        assert!(!policy.register(PROCESS, Marker::Unmarked).is_active());
    }

    #[test]
    fn policy_from_config_uses_logged_scopes() {
        let config = ObservabilityConfig {
            logged_scopes: vec!["forgeerp_services::payment".to_string()],
            ..ObservabilityConfig::default()
        };
        let policy = InvocationPolicy::from_config(&config).unwrap();

        assert!(!policy.is_eligible(&PROCESS, Marker::Loggable));
        let charge = MethodSignature::new("forgeerp_services::payment", "PaymentService", "charge");
        assert!(policy.is_eligible(&charge, Marker::Loggable));
    }

    #[test]
    fn infallible_unit_method_logs_success() {
        let capture = LogCapture::install();
        let process = policy().register(PROCESS, Marker::Loggable);

        process.invoke_infallible(|| ());

        assert_eq!(capture.messages().len(), 2);
        assert_eq!(capture.messages()[1], "leavingMethod OrderService::process");
    }

    #[test]
    fn return_value_is_passed_through_untouched() {
        let _capture = LogCapture::install();
        let process = policy().register(PROCESS, Marker::Loggable);
        let payload = vec![1_u8, 2, 3];
        let ptr = payload.as_ptr();

        let returned = process.invoke_infallible(move || payload);

        assert_eq!(returned, vec![1, 2, 3]);
        assert_eq!(returned.as_ptr(), ptr);
    }

    #[test]
    fn panic_logs_failure_and_resumes() {
        let capture = LogCapture::install();
        let process = policy().register(PROCESS, Marker::Loggable);

        let caught = panic::catch_unwind(AssertUnwindSafe(|| {
            process.invoke_infallible(|| -> u32 { panic!("ledger unavailable") })
        }));

        let payload = caught.expect_err("panic must propagate");
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"ledger unavailable"));
        assert_eq!(
            capture.messages(),
            vec![
                "enteringMethod OrderService::process",
                "leavingMethodException OrderService::process. Reason: ledger unavailable",
            ]
        );
    }

    #[test]
    fn wrapped_callable_logs_every_call() {
        let capture = LogCapture::install();
        let charge = policy().register(CHARGE, Marker::Loggable).wrap(|(amount, limit): (u64, u64)| {
            if amount <= limit {
                Ok(amount)
            } else {
                Err(Declined("card declined".into()))
            }
        });

        assert_eq!(charge((10, 100)), Ok(10));
        assert_eq!(charge((500, 100)), Err(Declined("card declined".into())));
        assert_eq!(
            capture.messages(),
            vec![
                "enteringMethod PaymentService::charge",
                "leavingMethod PaymentService::charge",
                "enteringMethod PaymentService::charge",
                "leavingMethodException PaymentService::charge. Reason: card declined",
            ]
        );
    }

    #[test]
    fn concurrent_invocations_each_get_one_entry_and_one_exit() {
        let capture = LogCapture::install();
        let dispatch = capture.dispatch();
        let names: Vec<&'static str> = (0..8)
            .map(|i| &*Box::leak(format!("method_{i}").into_boxed_str()))
            .collect();

        thread::scope(|s| {
            for (i, name) in names.iter().copied().enumerate() {
                let dispatch = dispatch.clone();
                s.spawn(move || {
                    tracing::dispatcher::with_default(&dispatch, || {
                        let sig = MethodSignature::new(module_path!(), "OrderService", name);
                        let interceptor = policy().register(sig, Marker::Loggable);
                        for _ in 0..10 {
                            let _: Result<usize, Declined> = interceptor.invoke(|| {
                                if i % 2 == 0 { Ok(i) } else { Err(Declined("odd".into())) }
                            });
                        }
                    });
                });
            }
        });

        let records = capture.records();
        assert_eq!(records.len(), 8 * 10 * 2);
        for name in &names {
            let own: Vec<_> = records
                .iter()
                .filter(|r| r.field("method") == Some(*name))
                .map(|r| r.message.split(' ').next().unwrap_or_default().to_string())
                .collect();
            assert_eq!(own.len(), 20);
            for pair in own.chunks(2) {
                assert_eq!(pair[0], "enteringMethod");
                assert!(pair[1] == "leavingMethod" || pair[1] == "leavingMethodException");
            }
        }
    }

    #[tokio::test]
    async fn async_success_and_failure() {
        let capture = LogCapture::install();
        let process = policy().register(PROCESS, Marker::Loggable);
        let charge = policy().register(CHARGE, Marker::Loggable);

        let ok: Result<u32, Declined> = process.invoke_async(async { Ok(42) }).await;
        let err: Result<u32, Declined> = charge
            .invoke_async(async { Err(Declined("card declined".into())) })
            .await;

        assert_eq!(ok, Ok(42));
        assert_eq!(err, Err(Declined("card declined".into())));
        assert_eq!(
            capture.messages(),
            vec![
                "enteringMethod OrderService::process",
                "leavingMethod OrderService::process",
                "enteringMethod PaymentService::charge",
                "leavingMethodException PaymentService::charge. Reason: card declined",
            ]
        );
    }

    #[tokio::test]
    async fn async_entry_waits_for_first_poll() {
        let capture = LogCapture::install();
        let process = policy().register(PROCESS, Marker::Loggable);

        let call = process.invoke_async(async { Ok::<_, Declined>(1) });
        assert!(capture.records().is_empty());

        assert_eq!(call.await, Ok(1));
        assert_eq!(capture.records().len(), 2);
    }

    #[tokio::test]
    async fn dropped_async_call_logs_cancellation() {
        let capture = LogCapture::install();
        let charge = policy().register(CHARGE, Marker::Loggable);

        let timed_out = tokio::time::timeout(
            Duration::from_millis(10),
            charge.invoke_async(pending::<Result<(), Declined>>()),
        )
        .await;

        assert!(timed_out.is_err());
        assert_eq!(
            capture.messages(),
            vec![
                "enteringMethod PaymentService::charge",
                "leavingMethodException PaymentService::charge. Reason: cancelled",
            ]
        );
    }

    #[tokio::test]
    async fn async_call_never_polled_logs_nothing() {
        let capture = LogCapture::install();
        let charge = policy().register(CHARGE, Marker::Loggable);

        drop(charge.invoke_async(pending::<Result<(), Declined>>()));

        assert!(capture.records().is_empty());
    }

    fn ledger_down() -> Result<u32, Declined> {
        panic!("ledger down")
    }

    /// Poll `fut` to completion, turning a panic into `Err(payload)`.
    async fn catch_panic<F: Future>(fut: F) -> std::thread::Result<F::Output> {
        let mut fut = pin!(fut);
        poll_fn(|cx| match panic::catch_unwind(AssertUnwindSafe(|| fut.as_mut().poll(cx))) {
            Ok(Poll::Ready(output)) => Poll::Ready(Ok(output)),
            Ok(Poll::Pending) => Poll::Pending,
            Err(payload) => Poll::Ready(Err(payload)),
        })
        .await
    }

    #[tokio::test]
    async fn async_panic_logs_failure_and_resumes() {
        let capture = LogCapture::install();
        let charge = policy().register(CHARGE, Marker::Loggable);

        let caught = catch_panic(charge.invoke_async(async { ledger_down() })).await;

        let payload = caught.expect_err("panic must propagate");
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"ledger down"));
        assert_eq!(
            capture.messages(),
            vec![
                "enteringMethod PaymentService::charge",
                "leavingMethodException PaymentService::charge. Reason: ledger down",
            ]
        );
    }

    #[tokio::test]
    async fn nested_async_panic_closes_both_invocations() {
        let capture = LogCapture::install();
        let process = policy().register(PROCESS, Marker::Loggable);
        let charge = policy().register(CHARGE, Marker::Loggable);

        let caught = catch_panic(
            process.invoke_async(async { charge.invoke_async(async { ledger_down() }).await }),
        )
        .await;

        assert!(caught.is_err());
        assert_eq!(
            capture.messages(),
            vec![
                "enteringMethod OrderService::process",
                "enteringMethod PaymentService::charge",
                "leavingMethodException PaymentService::charge. Reason: ledger down",
                "leavingMethodException OrderService::process. Reason: ledger down",
            ]
        );
    }

    #[test]
    fn nested_sync_panic_closes_both_invocations() {
        let capture = LogCapture::install();
        let process = policy().register(PROCESS, Marker::Loggable);
        let charge = policy().register(CHARGE, Marker::Loggable);

        let caught = panic::catch_unwind(AssertUnwindSafe(|| {
            process.invoke(|| charge.invoke(ledger_down))
        }));

        assert!(caught.is_err());
        assert_eq!(capture.messages().len(), 4);
        assert_eq!(
            capture.messages()[3],
            "leavingMethodException OrderService::process. Reason: ledger down"
        );
    }

    struct PanickingSink;

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for PanickingSink {
        fn on_event(
            &self,
            _event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            panic!("sink unavailable")
        }
    }

    #[test]
    fn panicking_sink_leaves_outcome_untouched() {
        use tracing_subscriber::layer::SubscriberExt;

        let subscriber = tracing_subscriber::registry().with(PanickingSink);
        let process = policy().register(PROCESS, Marker::Loggable);
        let ran = Cell::new(false);

        let (ok, err) = tracing::subscriber::with_default(subscriber, || {
            let ok: Result<u32, Declined> = process.invoke(|| {
                ran.set(true);
                Ok(42)
            });
            let err: Result<u32, Declined> = process.invoke(|| Err(Declined("card declined".into())));
            (ok, err)
        });

        assert!(ran.get());
        assert_eq!(ok, Ok(42));
        assert_eq!(err, Err(Declined("card declined".into())));
    }

    proptest! {
        #[test]
        fn records_name_the_registered_method(
            type_name in "[A-Z][A-Za-z0-9]{0,24}",
            method in "[a-z_][a-z0-9_]{0,24}",
            fails in any::<bool>(),
        ) {
            let capture = LogCapture::install();
            let type_name: &'static str = Box::leak(type_name.into_boxed_str());
            let method: &'static str = Box::leak(method.into_boxed_str());
            let interceptor = policy().register(
                MethodSignature::new(module_path!(), type_name, method),
                Marker::Loggable,
            );

            let _: Result<(), Declined> =
                interceptor.invoke(|| if fails { Err(Declined("x".into())) } else { Ok(()) });

            let records = capture.records();
            prop_assert_eq!(records.len(), 2);
            for record in &records {
                prop_assert_eq!(record.field("type_name"), Some(type_name));
                prop_assert_eq!(record.field("method"), Some(method));
            }
            let expected_exit = if fails {
                format!("leavingMethodException {type_name}::{method}. Reason: x")
            } else {
                format!("leavingMethod {type_name}::{method}")
            };
            prop_assert_eq!(&records[0].message, &format!("enteringMethod {type_name}::{method}"));
            prop_assert_eq!(&records[1].message, &expected_exit);
        }
    }
}
