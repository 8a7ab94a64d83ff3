use color_eyre::eyre::{Result, eyre};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Overrides the configured level when set, e.g. `RTSNAP_LOG=rtsnap=trace`.
pub const LOG_ENV: &str = "RTSNAP_LOG";

/// Installs the global subscriber. Logs go to stderr so stdout carries only
/// the rendered document.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| eyre!("invalid log filter `{}`: {e}", config.level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.with_ansi(false).try_init()
    };
    installed.map_err(|e| eyre!("failed to set tracing subscriber: {e}"))
}
