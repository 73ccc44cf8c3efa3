//! Log subscriber setup
//!
//! Events go to stderr so the case report on stdout stays clean.
//! Filter precedence: `--log-level`, then `ABICHECK_LOG`/`RUST_LOG`,
//! then `[logging] level` from abicheck.toml, then `warn`.

use abicheck_config::harness::DEFAULT_LOG_LEVEL;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a filter directive
pub const LOG_ENV: &str = "ABICHECK_LOG";

/// Resolve the filter directive from the available sources
pub fn resolve_filter(flag: Option<&str>, file_level: Option<&str>) -> EnvFilter {
    if let Some(level) = flag {
        return EnvFilter::new(level);
    }

    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(file_level.unwrap_or(DEFAULT_LOG_LEVEL)))
}

/// Install the global subscriber
///
/// A second call is a no-op.
pub fn init(flag: Option<&str>, file_level: Option<&str>, json: bool) {
    let filter = resolve_filter(flag, file_level);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().try_init().ok();
    } else {
        builder.try_init().ok();
    }
}
