//! Configuration data types.
//!
//! Plain data: one struct per INI section, every field defaulted. Parsing
//! lives in `parser`, serialization in `writer`, and the conversion into
//! runtime config types in `resolve`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::bulk::{
    DEFAULT_BROADCAST_PERCENT_STEP, DEFAULT_BROADCAST_TILE_STEP, DEFAULT_BULK_MAP,
    DEFAULT_FETCH_BASE_URL, DEFAULT_INITIAL_BROADCAST_DELAY, DEFAULT_MAX_CONCURRENT,
    DEFAULT_PROGRESS_QUEUE_CAPACITY, DEFAULT_TILE_TIMEOUT,
};
use crate::cache::{
    RedisNetwork, DEFAULT_CACHEABLE_PARAMS, DEFAULT_CACHE_MAX_ZOOM, DEFAULT_CACHE_TTL_SECS,
    DEFAULT_MEMORY_CACHE_SIZE, DEFAULT_REDIS_ADDRESS, DEFAULT_REDIS_DB,
    DEFAULT_REDIS_DIAL_TIMEOUT, DEFAULT_REDIS_NETWORK,
};
use crate::sql::ParamKind;
use crate::tile::{DEFAULT_GEOMETRY_FIELD, DEFAULT_UPSTREAM_TIMEOUT};

use super::defaults::{DEFAULT_BIND_ADDRESS, DEFAULT_LOG_LEVEL, DEFAULT_POSTGIS_MAX_CONNECTIONS};

/// Which tile source sits behind the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeneratorKind {
    /// Proxy to another tile server.
    #[default]
    Upstream,
    /// Render from PostGIS with the `[map.*]` templates.
    Postgis,
}

impl FromStr for GeneratorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "upstream" => Ok(GeneratorKind::Upstream),
            "postgis" => Ok(GeneratorKind::Postgis),
            _ => Err("must be one of: upstream, postgis".to_string()),
        }
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorKind::Upstream => write!(f, "upstream"),
            GeneratorKind::Postgis => write!(f, "postgis"),
        }
    }
}

/// Selected cache backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheBackendKind {
    None,
    #[default]
    Memory,
    Redis,
}

impl FromStr for CacheBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "" => Ok(CacheBackendKind::None),
            "memory" => Ok(CacheBackendKind::Memory),
            "redis" => Ok(CacheBackendKind::Redis),
            _ => Err("must be one of: none, memory, redis".to_string()),
        }
    }
}

impl fmt::Display for CacheBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheBackendKind::None => write!(f, "none"),
            CacheBackendKind::Memory => write!(f, "memory"),
            CacheBackendKind::Redis => write!(f, "redis"),
        }
    }
}

/// How bulk runs reach the tiles they warm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchMode {
    /// In-process, through the server's own middleware.
    #[default]
    Local,
    /// Over HTTP against `base_url`.
    Http,
}

impl FromStr for FetchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(FetchMode::Local),
            "http" => Ok(FetchMode::Http),
            _ => Err("must be one of: local, http".to_string()),
        }
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchMode::Local => write!(f, "local"),
            FetchMode::Http => write!(f, "http"),
        }
    }
}

/// `[server]`
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    /// Listen address (`host:port`).
    pub bind: String,
    pub generator: GeneratorKind,
    /// Base URL of the upstream tile server, required for `generator = upstream`.
    pub upstream_url: Option<String>,
    /// Upstream request timeout in seconds.
    pub upstream_timeout: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND_ADDRESS.to_string(),
            generator: GeneratorKind::default(),
            upstream_url: None,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT.as_secs(),
        }
    }
}

/// `[cache]`
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    pub backend: CacheBackendKind,
    /// Highest zoom level written to the cache.
    pub max_zoom: u32,
    /// Entry lifetime in seconds, zero for no expiry.
    pub ttl: u64,
    /// Byte budget of the memory backend.
    pub memory_size: u64,
    pub redis_network: RedisNetwork,
    pub redis_address: String,
    pub redis_password: Option<String>,
    pub redis_db: i64,
    pub redis_ssl: bool,
    /// Full connection URI; replaces the discrete redis_* fields when set.
    pub redis_uri: Option<String>,
    /// Redis connect deadline in milliseconds.
    pub redis_dial_timeout_ms: u64,
    /// Query parameter names allowed on cached requests.
    pub cacheable_params: Vec<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::default(),
            max_zoom: DEFAULT_CACHE_MAX_ZOOM,
            ttl: DEFAULT_CACHE_TTL_SECS,
            memory_size: DEFAULT_MEMORY_CACHE_SIZE,
            redis_network: DEFAULT_REDIS_NETWORK,
            redis_address: DEFAULT_REDIS_ADDRESS.to_string(),
            redis_password: None,
            redis_db: DEFAULT_REDIS_DB,
            redis_ssl: false,
            redis_uri: None,
            redis_dial_timeout_ms: DEFAULT_REDIS_DIAL_TIMEOUT.as_millis() as u64,
            cacheable_params: DEFAULT_CACHEABLE_PARAMS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

/// `[bulk]`
#[derive(Debug, Clone, PartialEq)]
pub struct BulkSettings {
    pub max_concurrent: usize,
    /// Per-tile deadline in seconds.
    pub tile_timeout: u64,
    pub broadcast_tile_step: u64,
    pub broadcast_percent_step: f64,
    pub queue_capacity: usize,
    pub initial_broadcast_delay_ms: u64,
    /// Map every bulk run warms.
    pub map: String,
    pub fetch_mode: FetchMode,
    /// Server warmed when `fetch_mode = http`.
    pub base_url: String,
}

impl Default for BulkSettings {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            tile_timeout: DEFAULT_TILE_TIMEOUT.as_secs(),
            broadcast_tile_step: DEFAULT_BROADCAST_TILE_STEP,
            broadcast_percent_step: DEFAULT_BROADCAST_PERCENT_STEP,
            queue_capacity: DEFAULT_PROGRESS_QUEUE_CAPACITY,
            initial_broadcast_delay_ms: DEFAULT_INITIAL_BROADCAST_DELAY.as_millis() as u64,
            map: DEFAULT_BULK_MAP.to_string(),
            fetch_mode: FetchMode::default(),
            base_url: DEFAULT_FETCH_BASE_URL.to_string(),
        }
    }
}

/// `[postgis]`
#[derive(Debug, Clone, PartialEq)]
pub struct PostgisSettings {
    /// `postgres://` connection URL, required for `generator = postgis`.
    pub url: Option<String>,
    pub max_connections: u32,
    /// Column excluded from `!COLUMNS!`.
    pub geometry_field: String,
}

impl Default for PostgisSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: DEFAULT_POSTGIS_MAX_CONNECTIONS,
            geometry_field: DEFAULT_GEOMETRY_FIELD.to_string(),
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Optional log file written in addition to stdout.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

/// `[map.<name>]`
#[derive(Debug, Clone, PartialEq)]
pub struct MapSettings {
    pub name: String,
    pub sql: String,
    /// Names of `[param.<name>]` sections this map accepts.
    pub params: Vec<String>,
}

/// `[param.<name>]`
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSettings {
    /// Request parameter name (the section suffix).
    pub name: String,
    pub token: String,
    pub sql: String,
    pub kind: ParamKind,
    pub default: Option<String>,
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub server: ServerSettings,
    pub cache: CacheSettings,
    pub bulk: BulkSettings,
    pub postgis: PostgisSettings,
    pub logging: LoggingSettings,
    /// In file order.
    pub maps: Vec<MapSettings>,
    /// In file order.
    pub params: Vec<ParamSettings>,
}
