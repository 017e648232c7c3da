//! Tracing, logging, and service-method invocation logging (shared setup).

/// Initialize process-wide observability (tracing/logging) from the environment.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
/// An invalid environment falls back to the default configuration and the
/// problem is reported through the installed subscriber.
pub fn init() {
    match ObservabilityConfig::from_env() {
        Ok(config) => {
            // Only a bad filter fails here, and `from_env` already rejected those.
            let _ = tracing::init(&config);
        }
        Err(err) => {
            let _ = tracing::init(&ObservabilityConfig::default());
            ::tracing::warn!(error = %err, "invalid observability environment, using defaults");
        }
    }
}

/// Initialize process-wide observability with an explicit configuration.
pub fn init_with(config: &ObservabilityConfig) -> Result<(), ConfigError> {
    tracing::init(config)
}

/// Observability configuration (filter, output format, logged scopes).
pub mod config;

/// Tracing subscriber construction (filters, layers).
pub mod tracing;

/// Entry/exit logging around opted-in service methods.
pub mod invocation;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use config::{ConfigError, LogFormat, ObservabilityConfig};
pub use invocation::{
    InvocationContext, InvocationObserver, InvocationPolicy, Interceptor, Marker, MethodSignature,
    ScopeFilter,
};
