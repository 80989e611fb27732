//! Tracing subscriber setup for the binary.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "topgear=info";

/// Install a fmt subscriber on stderr, filtered by `RUST_LOG` (default `topgear=info`).
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
