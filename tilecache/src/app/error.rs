//! Application error types.

use std::fmt;

use crate::cache::CacheError;
use crate::config::ConfigFileError;
use crate::tile::TileError;

/// Errors that can occur while starting or running the application.
#[derive(Debug)]
pub enum AppError {
    /// The configuration file could not be loaded or resolved.
    ConfigFile(ConfigFileError),

    /// A required setting is missing or inconsistent.
    Config(String),

    /// The cache backend failed to start.
    CacheStart(CacheError),

    /// The tile generator could not be created.
    Generator(TileError),

    /// The PostGIS pool could not connect.
    Database(sqlx::Error),

    /// The listener could not be bound or the server failed.
    Server(std::io::Error),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ConfigFile(e) => write!(f, "Failed to load configuration: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::CacheStart(e) => write!(f, "Failed to start cache backend: {}", e),
            AppError::Generator(e) => write!(f, "Failed to create tile generator: {}", e),
            AppError::Database(e) => write!(f, "Failed to connect to PostGIS: {}", e),
            AppError::Server(e) => write!(f, "HTTP server error: {}", e),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::ConfigFile(e) => Some(e),
            AppError::Config(_) => None,
            AppError::CacheStart(e) => Some(e),
            AppError::Generator(e) => Some(e),
            AppError::Database(e) => Some(e),
            AppError::Server(e) => Some(e),
        }
    }
}

impl From<ConfigFileError> for AppError {
    fn from(e: ConfigFileError) -> Self {
        AppError::ConfigFile(e)
    }
}

impl From<CacheError> for AppError {
    fn from(e: CacheError) -> Self {
        AppError::CacheStart(e)
    }
}

impl From<TileError> for AppError {
    fn from(e: TileError) -> Self {
        AppError::Generator(e)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Database(e)
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Server(e)
    }
}
