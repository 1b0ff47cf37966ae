//! Telemetry initialization for the alder daemon.
//!
//! Console tracing via `tracing-subscriber`: an `EnvFilter` (honoring
//! `RUST_LOG`, falling back to the configured level) feeding the `fmt`
//! layer on stdout.

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber.
///
/// Call this once at startup, before any `tracing` events are emitted.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
