//! Tracing/logging initialization.
//!
//! Filtering comes from `RUST_LOG`; when it is unset or invalid the given
//! default directive is used.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_DIRECTIVE: &str = "info";

fn filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// JSON logs with timestamps, filtered by `RUST_LOG` (default `info`).
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with_default(DEFAULT_DIRECTIVE);
}

/// Like [`init`], with a caller-chosen fallback directive
/// (e.g. `"accounts_infra=debug"`).
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_with_default(default_directive: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_directive))
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init()
        .is_ok()
}

/// Human-readable output captured by the test harness.
///
/// Every test may call this; only the first call installs the subscriber.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter("warn"))
        .with_test_writer()
        .try_init();
}
