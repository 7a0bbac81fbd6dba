//! INI configuration file (`~/.tilecache/config.ini`).
//!
//! ```text
//! [server]    bind, generator (upstream|postgis), upstream_url
//! [cache]     backend (none|memory|redis), max_zoom, ttl, redis_*
//! [bulk]      max_concurrent, tile_timeout, broadcast steps, fetch_mode
//! [postgis]   url, max_connections, geometry_field
//! [logging]   level, file
//! [map.NAME]  sql, params
//! [param.NAME] token, sql, type, default
//! ```
//!
//! A missing file means defaults. Any value that does not parse fails the
//! load with [`ConfigFileError::InvalidValue`] naming the section and key.

mod defaults;
mod file;
mod parser;
mod resolve;
mod settings;
mod size;
mod writer;

pub use defaults::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_BIND_ADDRESS, DEFAULT_LOG_LEVEL,
    DEFAULT_POSTGIS_MAX_CONNECTIONS,
};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    BulkSettings, CacheBackendKind, CacheSettings, ConfigFile, FetchMode, GeneratorKind,
    LoggingSettings, MapSettings, ParamSettings, PostgisSettings, ServerSettings,
};
pub use size::{format_size, parse_size, SizeParseError};
