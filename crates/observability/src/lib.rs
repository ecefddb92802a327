//! Process-wide tracing setup shared by binaries and tests.

/// Initialize process-wide tracing with JSON output.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, formatters).
pub mod tracing;

pub use self::tracing::{DEFAULT_DIRECTIVE, init_for_tests, init_with_default};
