//! Redis tile cache.
//!
//! Stores each payload as a plain string value under the serialized tile key,
//! with `EX ttl` when a TTL is configured. The multiplexed
//! [`ConnectionManager`] is cloned per call and reconnects on its own, so
//! one instance is shared by every request and bulk worker.
//!
//! Construction is fail-fast: the connection is opened and answered with
//! `PING` before the backend is handed out. A server that is down, or that
//! answers anything other than `PONG`, is a startup error.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info};

use crate::cache::config::RedisCacheConfig;
use crate::cache::key::TileKey;
use crate::cache::traits::{BoxFuture, CacheError, TileCache};

/// Redis-backed tile cache.
pub struct RedisTileCache {
    conn: ConnectionManager,
    max_zoom: u32,
    ttl_secs: u64,
}

impl RedisTileCache {
    /// Connect and verify the server answers `PING`.
    ///
    /// # Errors
    ///
    /// - `CacheError::Config` / `CacheError::HostMissing` for invalid options
    /// - `CacheError::Handshake` if the server is unreachable within the dial
    ///   timeout or replies with something other than `PONG`
    pub async fn connect(config: &RedisCacheConfig) -> Result<Self, CacheError> {
        let info = config.connection_info()?;
        let target = info.addr.to_string();
        let client = redis::Client::open(info)?;

        let mut conn = tokio::time::timeout(config.dial_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                CacheError::Handshake(format!(
                    "timed out connecting to {} after {:?}",
                    target, config.dial_timeout
                ))
            })?
            .map_err(|e| CacheError::Handshake(format!("cannot reach {}: {}", target, e)))?;

        let reply: String = tokio::time::timeout(
            config.dial_timeout,
            redis::cmd("PING").query_async(&mut conn),
        )
        .await
        .map_err(|_| CacheError::Handshake(format!("PING to {} timed out", target)))?
        .map_err(|e| CacheError::Handshake(format!("PING to {} failed: {}", target, e)))?;

        if reply != "PONG" {
            return Err(CacheError::Handshake(format!(
                "unexpected PING reply '{}' from {}",
                reply, target
            )));
        }

        info!(
            target = %target,
            db = config.db,
            max_zoom = config.max_zoom,
            ttl_secs = config.ttl_secs,
            "Connected to Redis tile cache"
        );

        Ok(Self {
            conn,
            max_zoom: config.max_zoom,
            ttl_secs: config.ttl_secs,
        })
    }
}

impl TileCache for RedisTileCache {
    fn name(&self) -> &str {
        "redis"
    }

    fn max_zoom(&self) -> u32 {
        self.max_zoom
    }

    fn get<'a>(&'a self, key: &'a TileKey) -> BoxFuture<'a, Result<Option<Vec<u8>>, CacheError>> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            let value: Option<Vec<u8>> = conn.get(key.to_string()).await?;
            Ok(value)
        })
    }

    fn set<'a>(
        &'a self,
        key: &'a TileKey,
        value: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), CacheError>> {
        Box::pin(async move {
            if key.zoom > self.max_zoom {
                debug!(key = %key, max_zoom = self.max_zoom, "Zoom above cache limit, not stored");
                return Ok(());
            }

            let mut conn = self.conn.clone();
            if self.ttl_secs > 0 {
                let _: () = conn.set_ex(key.to_string(), value, self.ttl_secs).await?;
            } else {
                let _: () = conn.set(key.to_string(), value).await?;
            }
            Ok(())
        })
    }

    fn purge<'a>(&'a self, key: &'a TileKey) -> BoxFuture<'a, Result<(), CacheError>> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            let _: i64 = conn.del(key.to_string()).await?;
            Ok(())
        })
    }
}
