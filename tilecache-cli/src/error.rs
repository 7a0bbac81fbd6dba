//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and exit codes.

use std::fmt;
use std::process;

use tilecache::app::AppError;
use tilecache::bulk::BulkError;
use tilecache::cache::{CacheError, KeyError};
use tilecache::config::ConfigFileError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to load or save the config file
    ConfigFile(ConfigFileError),
    /// Failed to start the application
    App(AppError),
    /// Cache backend error
    Cache(CacheError),
    /// Invalid tile path
    TilePath(KeyError),
    /// Invalid bulk run
    Bulk(BulkError),
    /// Failed to create the Tokio runtime
    Runtime(std::io::Error),
}

impl CliError {
    /// Exit the process with an error message and code 1.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }

        match self {
            CliError::App(AppError::CacheStart(_)) => {
                eprintln!();
                eprintln!("Check the [cache] section of your config.ini, or set");
                eprintln!("  backend = memory");
                eprintln!("to run without Redis.");
            }
            CliError::App(AppError::Config(_)) => {
                eprintln!();
                eprintln!("Run 'tilecache config path' to find the config file.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::App(e) => write!(f, "{}", e),
            CliError::Cache(e) => write!(f, "Cache error: {}", e),
            CliError::TilePath(e) => write!(f, "{}", e),
            CliError::Bulk(e) => write!(f, "Invalid bulk run: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to create Tokio runtime: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::App(e) => e.source(),
            CliError::Cache(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<AppError> for CliError {
    fn from(e: AppError) -> Self {
        CliError::App(e)
    }
}

impl From<CacheError> for CliError {
    fn from(e: CacheError) -> Self {
        CliError::Cache(e)
    }
}

impl From<KeyError> for CliError {
    fn from(e: KeyError) -> Self {
        CliError::TilePath(e)
    }
}

impl From<BulkError> for CliError {
    fn from(e: BulkError) -> Self {
        CliError::Bulk(e)
    }
}
