//! Logging setup using tracing.
//!
//! Library code only emits `tracing` events; embedding applications call
//! [`init_logging`] once at startup to print them to stderr.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::core::config::Config;

/// Filter directive used when `RUST_LOG` is not set.
///
/// `verbose` forces debug output for this crate; otherwise the configured
/// level applies, defaulting to info.
pub fn default_directive(verbose: bool, config: Option<&Config>) -> String {
    let level = if verbose {
        "debug"
    } else {
        config.map_or("info", Config::log_level)
    };
    format!("rewind={level}")
}

/// Install a stderr subscriber. `RUST_LOG` overrides the default filter.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(verbose: bool, config: Option<&Config>) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, config)));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
}
