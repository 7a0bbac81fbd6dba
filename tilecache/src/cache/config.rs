//! Typed configuration for cache backends.
//!
//! Every option has a named default. Validation happens when a backend is
//! constructed, so a bad address fails startup instead of the first request.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use redis::{ConnectionInfo, IntoConnectionInfo};

use super::traits::CacheError;
use crate::coord::MAX_ZOOM;

/// Default transport for the Redis connection.
pub const DEFAULT_REDIS_NETWORK: RedisNetwork = RedisNetwork::Tcp;

/// Default Redis address.
pub const DEFAULT_REDIS_ADDRESS: &str = "127.0.0.1:6379";

/// Default logical database index.
pub const DEFAULT_REDIS_DB: i64 = 0;

/// Default highest cacheable zoom level.
pub const DEFAULT_CACHE_MAX_ZOOM: u32 = MAX_ZOOM;

/// Default entry lifetime in seconds. Zero means entries never expire.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 0;

/// Default memory budget for the in-process backend (256 MB).
pub const DEFAULT_MEMORY_CACHE_SIZE: u64 = 256 * 1024 * 1024;

/// Connection timeout for the Redis liveness check.
pub const DEFAULT_REDIS_DIAL_TIMEOUT: Duration = Duration::from_secs(3);

/// Transport used to reach Redis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedisNetwork {
    Tcp,
    Unix,
}

impl FromStr for RedisNetwork {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tcp" => Ok(RedisNetwork::Tcp),
            "unix" => Ok(RedisNetwork::Unix),
            other => Err(CacheError::Config(format!(
                "unknown network '{}': expected 'tcp' or 'unix'",
                other
            ))),
        }
    }
}

impl fmt::Display for RedisNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedisNetwork::Tcp => write!(f, "tcp"),
            RedisNetwork::Unix => write!(f, "unix"),
        }
    }
}

/// Options for the Redis backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RedisCacheConfig {
    /// Transport (`tcp` or `unix`).
    pub network: RedisNetwork,
    /// `host:port` for TCP, a socket path for Unix.
    pub address: String,
    /// Password sent with AUTH, if any.
    pub password: Option<String>,
    /// Logical database index.
    pub db: i64,
    /// Connect over TLS (TCP only). The host doubles as the TLS server name.
    pub ssl: bool,
    /// Highest zoom level written to the cache.
    pub max_zoom: u32,
    /// Entry lifetime in seconds; zero disables expiry.
    pub ttl_secs: u64,
    /// Full connection URI. When set it replaces every discrete field above
    /// except `max_zoom` and `ttl_secs`.
    pub uri: Option<String>,
    /// Deadline for connecting and answering PING at startup.
    pub dial_timeout: Duration,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            network: DEFAULT_REDIS_NETWORK,
            address: DEFAULT_REDIS_ADDRESS.to_string(),
            password: None,
            db: DEFAULT_REDIS_DB,
            ssl: false,
            max_zoom: DEFAULT_CACHE_MAX_ZOOM,
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
            uri: None,
            dial_timeout: DEFAULT_REDIS_DIAL_TIMEOUT,
        }
    }
}

impl RedisCacheConfig {
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_network(mut self, network: RedisNetwork) -> Self {
        self.network = network;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_db(mut self, db: i64) -> Self {
        self.db = db;
        self
    }

    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    pub fn with_max_zoom(mut self, max_zoom: u32) -> Self {
        self.max_zoom = max_zoom;
        self
    }

    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Build the client connection info, validating the address.
    ///
    /// # Errors
    ///
    /// - `CacheError::HostMissing` if a TCP address has an empty host
    /// - `CacheError::Config` for an unparseable address, port or URI
    pub fn connection_info(&self) -> Result<ConnectionInfo, CacheError> {
        if let Some(uri) = self.uri.as_deref().filter(|u| !u.trim().is_empty()) {
            return uri
                .into_connection_info()
                .map_err(|e| CacheError::Config(format!("invalid uri: {}", e)));
        }

        let base = match self.network {
            RedisNetwork::Tcp => {
                let (host, port) = split_host_port(&self.address)?;
                let scheme = if self.ssl { "rediss" } else { "redis" };
                format!("{}://{}:{}", scheme, host, port)
            }
            RedisNetwork::Unix => {
                if self.address.trim().is_empty() {
                    return Err(CacheError::Config(
                        "unix network requires a socket path".to_string(),
                    ));
                }
                format!("redis+unix://{}", self.address)
            }
        };

        let mut info = base
            .as_str()
            .into_connection_info()
            .map_err(|e| CacheError::Config(format!("invalid address: {}", e)))?;
        info.redis.db = self.db;
        info.redis.password = self.password.clone().filter(|p| !p.is_empty());

        Ok(info)
    }
}

fn split_host_port(address: &str) -> Result<(&str, u16), CacheError> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| CacheError::Config(format!("address '{}' has no port", address)))?;

    if host.trim_start_matches('[').trim_end_matches(']').is_empty() {
        return Err(CacheError::HostMissing(address.to_string()));
    }

    let port = port
        .parse()
        .map_err(|_| CacheError::Config(format!("invalid port in address '{}'", address)))?;

    Ok((host, port))
}

/// Options for the in-process backend.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryCacheConfig {
    /// Total payload bytes kept before LRU eviction.
    pub max_size_bytes: u64,
    pub max_zoom: u32,
    pub ttl_secs: u64,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MEMORY_CACHE_SIZE,
            max_zoom: DEFAULT_CACHE_MAX_ZOOM,
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

impl MemoryCacheConfig {
    pub fn with_max_size_bytes(mut self, bytes: u64) -> Self {
        self.max_size_bytes = bytes;
        self
    }

    pub fn with_max_zoom(mut self, max_zoom: u32) -> Self {
        self.max_zoom = max_zoom;
        self
    }

    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }
}

/// Which backend to build at startup.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CacheBackendConfig {
    /// Serve every tile straight from the generator.
    #[default]
    None,
    Memory(MemoryCacheConfig),
    Redis(RedisCacheConfig),
}

impl CacheBackendConfig {
    pub fn name(&self) -> &'static str {
        match self {
            CacheBackendConfig::None => "none",
            CacheBackendConfig::Memory(_) => "memory",
            CacheBackendConfig::Redis(_) => "redis",
        }
    }
}
