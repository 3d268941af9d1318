//! Logging setup
//!
//! Compact tracing output, crate-scoped, overridable through `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber. `verbose` raises the crate level to
/// debug; `RUST_LOG` wins when set.
pub fn init_logger(verbose: bool) {
    let default = if verbose {
        "webplay=debug"
    } else {
        "webplay=info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
