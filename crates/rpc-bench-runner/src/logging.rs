//! Tracing setup for the binary

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber.
///
/// Defaults to INFO; `RUST_LOG` overrides it, e.g. `RUST_LOG=rpc_bench::child=debug`
/// to see daemon and generator output.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
