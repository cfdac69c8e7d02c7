//! Tracing setup for test binaries.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Initialize the tracing subscriber for a test process.
///
/// Safe to call from every test; only the first call installs the
/// subscriber. Honors `RUST_LOG`, defaulting to harness-level debug so
/// engine retries and destroys show up in failing test output.
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,terraspan=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
