//! Logging utilities
//!
//! Helpers for initializing the tracing subscriber. Library code only emits
//! `tracing` events; installing a subscriber is left to binaries and tests.

use tracing_subscriber::{EnvFilter, fmt};

/// Initialize logging with default settings
///
/// # Environment Variables
/// - `RUST_LOG` - Log level filter (default: "info")
pub fn init() {
    init_with_level("info")
}

/// Initialize logging with a specific level, written to stderr.
///
/// `RUST_LOG` still takes precedence when set.
pub fn init_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Initialize logging for tests
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
