//! In-memory tile cache using moka.
//!
//! Wraps `moka::future::Cache` with the same zoom gating and TTL semantics
//! as the Redis backend. Suited to single-process deployments and tests.
//!
//! Moka evicts least-recently-used entries once the weighted size (payload
//! bytes) exceeds `max_size_bytes`.

use std::time::Duration;

use moka::future::Cache as MokaCache;

use crate::cache::config::MemoryCacheConfig;
use crate::cache::key::TileKey;
use crate::cache::traits::{BoxFuture, CacheError, TileCache};

/// In-memory tile cache.
pub struct MemoryTileCache {
    /// The underlying moka cache, keyed by the serialized tile key.
    cache: MokaCache<String, Vec<u8>>,

    max_zoom: u32,
}

impl MemoryTileCache {
    pub fn new(config: &MemoryCacheConfig) -> Self {
        let mut builder = MokaCache::builder()
            // Weight each entry by its payload size
            .weigher(|_key: &String, value: &Vec<u8>| -> u32 {
                value.len().min(u32::MAX as usize) as u32
            })
            .max_capacity(config.max_size_bytes);

        if config.ttl_secs > 0 {
            builder = builder.time_to_live(Duration::from_secs(config.ttl_secs));
        }

        Self {
            cache: builder.build(),
            max_zoom: config.max_zoom,
        }
    }

    /// Number of stored entries (approximate until pending tasks run).
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Total payload bytes held.
    pub fn size_bytes(&self) -> u64 {
        self.cache.weighted_size()
    }
}

impl TileCache for MemoryTileCache {
    fn name(&self) -> &str {
        "memory"
    }

    fn max_zoom(&self) -> u32 {
        self.max_zoom
    }

    fn get<'a>(&'a self, key: &'a TileKey) -> BoxFuture<'a, Result<Option<Vec<u8>>, CacheError>> {
        Box::pin(async move { Ok(self.cache.get(&key.to_string()).await) })
    }

    fn set<'a>(
        &'a self,
        key: &'a TileKey,
        value: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), CacheError>> {
        Box::pin(async move {
            if key.zoom > self.max_zoom {
                return Ok(());
            }
            self.cache.insert(key.to_string(), value).await;
            Ok(())
        })
    }

    fn purge<'a>(&'a self, key: &'a TileKey) -> BoxFuture<'a, Result<(), CacheError>> {
        Box::pin(async move {
            self.cache.invalidate(&key.to_string()).await;
            Ok(())
        })
    }
}
