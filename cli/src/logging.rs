//! stderr logging setup.

use std::env;
use std::io;

use tracing_subscriber::EnvFilter;

/// Filter directives, e.g. `OTPKEEP_LOG=otpkeep_vault=debug`.
pub const LOG_ENV: &str = "OTPKEEP_LOG";
/// Any value turns on debug logging.
pub const LEGACY_DEBUG_ENV: &str = "DEBUG";

const DEFAULT_FILTER: &str = "warn";

/// Debug when asked for, then `OTPKEEP_LOG`, then `warn`.
pub fn filter_directive(debug: bool, log_env: Option<String>) -> String {
    if debug {
        return "debug".to_string();
    }
    log_env
        .filter(|directive| !directive.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(debug_flag: bool) {
    let debug = debug_flag || env::var_os(LEGACY_DEBUG_ENV).is_some();
    let directive = filter_directive(debug, env::var(LOG_ENV).ok());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}
