//! Development-time tracing for the protocol layer.
//!
//! Resolution stages and cache reuse log at `debug`, each `execute` call logs
//! at `info`, and failures turned into outcome values log at `warn`. Nothing
//! here is part of a trace result.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install a stderr subscriber filtered by `RUST_LOG` (default `warn`).
///
/// Panics if a global subscriber is already set. Use [`try_init`] where that
/// can happen.
///
/// # Example
/// ```bash
/// RUST_LOG=tracekit=debug cargo test
/// ```
pub fn init() {
    tracing_subscriber::registry()
        .with(filter())
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

/// Like [`init`], but reports an already-installed subscriber as an error.
pub fn try_init() -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(filter())
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init()
}
