//! Core traits for tile cache backends.
//!
//! The `TileCache` trait is the capability contract every backend fulfils:
//! fetch, store and purge the encoded payload of one tile. Backends own
//! their eviction and expiry policy.
//!
//! # Design Principles
//!
//! - **Typed keys**: callers hand over a [`TileKey`]; the backend decides how
//!   to serialize it
//! - **Miss is not an error**: `Ok(None)` is a confirmed absence, `Err` means
//!   the store could not be reached
//! - **Zoom-gated writes**: `set` above `max_zoom()` succeeds without storing
//! - **Dyn-compatible**: uses `Pin<Box<dyn Future>>` for trait object support
//!
//! # Example
//!
//! ```ignore
//! use tilecache::cache::{MemoryCacheConfig, MemoryTileCache, TileCache, TileKey};
//!
//! let cache = MemoryTileCache::new(&MemoryCacheConfig::default());
//! let key = TileKey::new("osm", 3, 4, 2);
//!
//! cache.set(&key, vec![1, 2, 3]).await?;
//! assert_eq!(cache.get(&key).await?, Some(vec![1, 2, 3]));
//! ```

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use super::key::{KeyError, TileKey};

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Backend options are invalid.
    #[error("Invalid cache configuration: {0}")]
    Config(String),

    /// The configured address has no host part.
    #[error("Cache address '{0}' is missing a host")]
    HostMissing(String),

    /// The store was reachable but did not answer the liveness check.
    #[error("Cache handshake failed: {0}")]
    Handshake(String),

    /// Communication with the store failed.
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// A key could not be derived.
    #[error(transparent)]
    Key(#[from] KeyError),
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        CacheError::Backend(e.to_string())
    }
}

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Tile payload store.
///
/// Implementations must be `Send + Sync`; one instance is shared by every
/// request handler and every bulk-run worker.
pub trait TileCache: Send + Sync {
    /// Short backend name for logs ("redis", "memory").
    fn name(&self) -> &str;

    /// Highest zoom level that will be stored.
    fn max_zoom(&self) -> u32;

    /// Retrieve the payload stored under `key`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(data))` if the key exists
    /// - `Ok(None)` if the key is not found
    /// - `Err(_)` if the backend could not be queried
    fn get<'a>(&'a self, key: &'a TileKey) -> BoxFuture<'a, Result<Option<Vec<u8>>, CacheError>>;

    /// Store a payload under `key`.
    ///
    /// A no-op returning `Ok(())` when `key.zoom > self.max_zoom()`.
    /// Entries expire after the backend's configured TTL; a TTL of zero
    /// means they never expire.
    fn set<'a>(&'a self, key: &'a TileKey, value: Vec<u8>)
        -> BoxFuture<'a, Result<(), CacheError>>;

    /// Remove the entry under `key`. Removing a missing key is not an error.
    fn purge<'a>(&'a self, key: &'a TileKey) -> BoxFuture<'a, Result<(), CacheError>>;
}
