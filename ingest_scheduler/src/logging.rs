//! Logging initialization using the `tracing` ecosystem.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber.
///
/// Should be called once at program start. `RUST_LOG` takes precedence over
/// `log_level` when set. With `json` every event is written as one JSON
/// object per line, otherwise as human-readable text.
pub fn init_logging(log_level: &str, json: bool) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(log_level))?;

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(fmt::layer().json().with_target(true).with_current_span(false))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init()?;
    }
    Ok(())
}
