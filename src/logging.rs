//! Operator diagnostics on stderr.
//!
//! The ledger and evidence files are the record; logs are for watching a
//! worker run. Only the binary installs a subscriber.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Install the global subscriber. Safe to call more than once; later calls are no-ops.
pub fn init(debug: bool, level: &str) {
    let filter = build_env_filter(debug, level);
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

/// `RUST_LOG` wins, then `--debug`, then the configured level.
fn build_env_filter(debug: bool, level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let directive = if debug { "debug" } else { level };
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"))
}
