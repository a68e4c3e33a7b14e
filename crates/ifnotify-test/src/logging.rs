//! Tracing output for tests.

use tracing_subscriber::EnvFilter;

/// Route `tracing` output through the test harness so it is only shown for
/// failing tests. Honors `RUST_LOG`; defaults to `ifnotify_events=debug`.
///
/// Safe to call from every test: only the first call installs a subscriber.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ifnotify_events=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
