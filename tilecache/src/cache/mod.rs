//! Tile cache: keys, backends and the read-through middleware.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  TileCacheMiddleware                                          │
//! │    key = TileKey::parse_path(path).with_query(raw_query)      │
//! │                     │                                         │
//! │                     ▼                                         │
//! │            Arc<dyn TileCache>                                 │
//! │              ├── RedisTileCache   (shared, TTL via EX)        │
//! │              └── MemoryTileCache  (moka, in-process)          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Backends are built once at startup with [`build_cache`]. Choosing no
//! backend is an explicit, logged decision; an unreachable Redis is a
//! startup error, never a silent fallback.

mod config;
mod key;
mod middleware;
mod providers;
mod traits;

pub use config::{
    CacheBackendConfig, MemoryCacheConfig, RedisCacheConfig, RedisNetwork,
    DEFAULT_CACHE_MAX_ZOOM, DEFAULT_CACHE_TTL_SECS, DEFAULT_MEMORY_CACHE_SIZE,
    DEFAULT_REDIS_ADDRESS, DEFAULT_REDIS_DB, DEFAULT_REDIS_DIAL_TIMEOUT, DEFAULT_REDIS_NETWORK,
};
pub use key::{fingerprint, KeyError, TileKey};
pub use middleware::{TileCacheMiddleware, DEFAULT_CACHEABLE_PARAMS};
pub use providers::{MemoryTileCache, RedisTileCache};
pub use traits::{BoxFuture, CacheError, TileCache};

use std::sync::Arc;

use tracing::{info, warn};

/// Build the configured backend.
///
/// # Returns
///
/// - `Ok(None)` when caching is disabled (logged as a warning)
/// - `Ok(Some(cache))` for a live backend
///
/// # Errors
///
/// Any construction error of the selected backend, including a failed
/// Redis liveness check.
pub async fn build_cache(
    config: &CacheBackendConfig,
) -> Result<Option<Arc<dyn TileCache>>, CacheError> {
    match config {
        CacheBackendConfig::None => {
            warn!("No cache backend configured, tiles will be generated on every request");
            Ok(None)
        }
        CacheBackendConfig::Memory(memory) => {
            info!(
                max_size_bytes = memory.max_size_bytes,
                max_zoom = memory.max_zoom,
                ttl_secs = memory.ttl_secs,
                "Using in-memory tile cache"
            );
            Ok(Some(Arc::new(MemoryTileCache::new(memory))))
        }
        CacheBackendConfig::Redis(redis) => {
            let cache = RedisTileCache::connect(redis).await?;
            Ok(Some(Arc::new(cache)))
        }
    }
}
