//! Tracing/logging initialization.
//!
//! One `EnvFilter` plus one `fmt` layer on a registry. JSON is the default
//! output; `pretty`/`compact` are meant for local development.

use tracing_subscriber::{
    Layer, Registry,
    fmt::{MakeWriter, time::SystemTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::{ConfigError, LogFormat, ObservabilityConfig};

/// Initialize tracing/logging for the process, writing to stdout.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(config: &ObservabilityConfig) -> Result<(), ConfigError> {
    let subscriber = build_subscriber(config, std::io::stdout)?;
    // A global subscriber already exists: keep it.
    let _ = subscriber.try_init();
    Ok(())
}

/// Build the process subscriber over an arbitrary writer without installing it.
pub fn build_subscriber<W>(
    config: &ObservabilityConfig,
    writer: W,
) -> Result<impl tracing::Subscriber + Send + Sync + use<W>, ConfigError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = config.env_filter()?;

    Ok(tracing_subscriber::registry()
        .with(fmt_layer(config.format, writer))
        .with(filter))
}

fn fmt_layer<W>(format: LogFormat, writer: W) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    // Keep the target: it names the logger (e.g. `forgeerp_observability::invocation`).
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(true);

    match format {
        LogFormat::Json => layer.json().with_timer(SystemTime).boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}
