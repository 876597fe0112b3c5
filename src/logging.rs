//! Diagnostic logging setup for the binary.
//!
//! Diagnostics go to stderr through `tracing`; user-facing reports are
//! printed separately by [`crate::output`].

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding the log filter, e.g. `BLUSORT_LOG=debug`.
pub const LOG_ENV: &str = "BLUSORT_LOG";

/// Installs the global subscriber.
///
/// `verbose` forces debug output for this crate; otherwise the filter comes
/// from `BLUSORT_LOG`, defaulting to warnings only. Calling this twice is
/// harmless.
pub fn init_logger(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("blusort=debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .with(filter)
        .try_init();
}
