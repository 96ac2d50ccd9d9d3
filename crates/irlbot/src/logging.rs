//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber: compact output on stderr, filtered by
/// `RUST_LOG` when set and by `level` otherwise.
///
/// Subsequent calls are no-ops.
pub fn init_subscriber(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact();

    let _ = subscriber.try_init();
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
