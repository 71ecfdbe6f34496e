//! Tracing initialisation for the glci-promote binary.
//!
//! The library crates only emit events; the binary decides where they go by
//! calling [`init`] once at startup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs a stdout subscriber filtered by `RUST_LOG`, or by `level` when unset.
///
/// Only the first call has an effect.
pub fn init(level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stdout).with_ansi(false))
        .try_init()
        .ok();
}
