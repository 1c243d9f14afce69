//! Tracing initialization

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "RPT_LOG";

/// Initialize logging to stderr
///
/// Reads per-target levels from `RPT_LOG`, e.g. `RPT_LOG=rpt=debug,rpt::audit=info`.
/// Falls back to `rpt=warn` if the variable is unset or invalid. Safe to call
/// more than once.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("rpt=warn"));

        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .with(filter)
            .try_init();
    });
}
