//! Helpers shared across CLI commands.

use std::path::Path;

use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::info;

use tilecache::config::ConfigFile;
use tilecache::logging::{init_logging, LoggingGuard};

use crate::error::CliError;

/// Load the config from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    let config = match path {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    Ok(config)
}

/// Install logging as configured by `[logging]`.
pub fn start_logging(config: &ConfigFile) -> Result<LoggingGuard, CliError> {
    init_logging(&config.logging).map_err(|e| CliError::LoggingInit(e.to_string()))
}

/// Multi-threaded runtime for one command.
pub fn runtime() -> Result<Runtime, CliError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)
}

/// Cancel `token` on the first Ctrl-C.
pub fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            token.cancel();
        }
    });
}

/// Parse `min_lng,min_lat,max_lng,max_lat`.
///
/// Only the numbers are checked here; the count is validated with the rest
/// of the run so the message matches the HTTP API's.
pub fn parse_bounds(value: &str) -> Result<Vec<f64>, CliError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<f64>()
                .map_err(|_| CliError::Config(format!("invalid coordinate '{}' in --bounds", part)))
        })
        .collect()
}
