//! Logging and metrics.
//!
//! Services emit `tracing` events and `metrics` counters. Nothing here
//! installs a metrics exporter; the host process may install a recorder.

mod logging;

pub use logging::{LogFormat, LoggingConfig, LoggingSettings};

use crate::{Error, Result};
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static LOGGING_INIT: OnceLock<()> = OnceLock::new();

/// Installs the global `tracing` subscriber, writing to stderr.
///
/// `RUST_LOG` overrides the configured directive. Calls after the first
/// successful one do nothing.
///
/// # Errors
///
/// Returns an error if the directive is invalid or another subscriber is
/// already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    if LOGGING_INIT.get().is_some() {
        return Ok(());
    }

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.directive)
            .map_err(|e| Error::InvalidInput(format!("log directive: {e}")))?,
    };

    match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .with(filter)
            .try_init()
            .map_err(init_error)?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .with(filter)
            .try_init()
            .map_err(init_error)?,
    }

    let _ = LOGGING_INIT.set(());
    Ok(())
}

#[allow(clippy::needless_pass_by_value)]
fn init_error(e: tracing_subscriber::util::TryInitError) -> Error {
    Error::store("logging_init", e)
}
