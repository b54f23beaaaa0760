//! `tribunal-observability` — process-wide tracing/logging setup.

use tracing_subscriber::EnvFilter;

/// Initialize tracing for the process: JSON lines, timestamps, level
/// filtering via `RUST_LOG` (default `info`).
///
/// Safe to call multiple times; subsequent calls become no-ops, which lets
/// the binary and integration tests share one entrypoint.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
