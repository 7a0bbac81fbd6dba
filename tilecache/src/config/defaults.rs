//! Default values for settings that have no home module.
//!
//! Cache and bulk defaults live next to the types they configure
//! (`cache::DEFAULT_*`, `bulk::DEFAULT_*`); this module only adds the
//! server, PostGIS and logging ones.

/// Default listen address of the tile server.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:19089";

/// Default pool size for the PostGIS connection pool.
pub const DEFAULT_POSTGIS_MAX_CONNECTIONS: u32 = 10;

/// Default log level when neither the config file nor `RUST_LOG` set one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Name of the configuration directory under the home directory.
pub const CONFIG_DIR_NAME: &str = ".tilecache";

/// Name of the configuration file inside the configuration directory.
pub const CONFIG_FILE_NAME: &str = "config.ini";
