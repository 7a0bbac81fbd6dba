//! Read-through cache in front of a tile generator.
//!
//! # Request flow
//!
//! ```text
//!   TileRequest
//!        │
//!        ▼
//!   no backend? ── yes ──────────────────────────────► generator
//!        │ no
//!   query without an allow-listed param? ── yes ─────► generator
//!        │ no
//!   derive key (path + query fingerprint)
//!        │
//!   cache.get ── error ── log ───────────────────────► generator
//!        │
//!    hit ├──► cached bytes, CacheStatus::Hit
//!        │
//!   miss └──► generator ──► body wrapped in capture, CacheStatus::Miss
//!                                  │
//!                     stream ends cleanly, non-empty ──► cache.set
//! ```
//!
//! The capture buffers chunks as the caller reads them and writes the
//! buffer when the body ends. A body error, an empty body, or the caller
//! dropping the stream early (disconnect) all skip the write. Write failures
//! are logged and never reach the caller.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, warn};

use super::key::{KeyError, TileKey};
use super::traits::TileCache;
use crate::tile::{
    CacheStatus, TileBody, TileError, TileGenerator, TileRequest, TileResponse, MVT_CONTENT_TYPE,
};

/// Query parameters that make a request cacheable.
pub const DEFAULT_CACHEABLE_PARAMS: [&str; 2] = ["task_id", "isSlice"];

/// Cache layer wrapping tile generation.
pub struct TileCacheMiddleware {
    cache: Option<Arc<dyn TileCache>>,
    cacheable_params: Vec<String>,
}

impl TileCacheMiddleware {
    /// Create a middleware; `None` disables caching entirely.
    pub fn new(cache: Option<Arc<dyn TileCache>>) -> Self {
        Self {
            cache,
            cacheable_params: DEFAULT_CACHEABLE_PARAMS.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Replace the allow-list of cache-relevant query parameter names.
    pub fn with_cacheable_params(mut self, params: Vec<String>) -> Self {
        self.cacheable_params = params;
        self
    }

    pub fn cache(&self) -> Option<&Arc<dyn TileCache>> {
        self.cache.as_ref()
    }

    /// Cache key for `request`, including the query fingerprint.
    pub fn cache_key(&self, request: &TileRequest) -> Result<TileKey, KeyError> {
        let key = request.tile_key()?;
        Ok(match request.query() {
            Some(query) => key.with_query(query),
            None => key,
        })
    }

    /// A request is cacheable when it has no query, or when at least one
    /// of its parameter names is on the allow-list.
    ///
    /// Once cacheable, the whole raw query is fingerprinted, not just the
    /// allow-listed parameters. Any other parameter alongside them, such as
    /// `task_id=a&nonce=123`, produces a distinct key for every distinct
    /// value, so a random extra parameter defeats the cache.
    fn is_cacheable_query(&self, request: &TileRequest) -> bool {
        if request.query().is_none() {
            return true;
        }
        request
            .query_pairs()
            .iter()
            .any(|(name, _)| self.cacheable_params.iter().any(|p| p == name))
    }

    /// Serve `request`, from the cache when possible.
    pub async fn serve(
        &self,
        request: &TileRequest,
        generator: &dyn TileGenerator,
    ) -> Result<TileResponse, TileError> {
        let Some(cache) = &self.cache else {
            return generator.generate(request).await;
        };

        if !self.is_cacheable_query(request) {
            debug!(
                path = request.path(),
                query = request.query().unwrap_or_default(),
                "Query has no cache-relevant parameters, bypassing cache"
            );
            return generator.generate(request).await;
        }

        let key = match self.cache_key(request) {
            Ok(key) => key,
            Err(e) => {
                error!(path = request.path(), error = %e, "Cannot derive cache key");
                return generator.generate(request).await;
            }
        };

        match cache.get(&key).await {
            Ok(Some(bytes)) => {
                debug!(key = %key, bytes = bytes.len(), "Tile cache hit");
                return Ok(TileResponse::ok(bytes, MVT_CONTENT_TYPE)
                    .with_cache_status(CacheStatus::Hit));
            }
            Ok(None) => {
                debug!(key = %key, "Tile cache miss");
            }
            Err(e) => {
                error!(key = %key, backend = cache.name(), error = %e, "Cache read failed");
                return generator.generate(request).await;
            }
        }

        let mut response = generator.generate(request).await?;
        if response.is_success() {
            response.body = capture_body(response.body, Arc::clone(cache), key);
        }
        Ok(response.with_cache_status(CacheStatus::Miss))
    }
}

/// State carried through the capturing stream.
struct Capture {
    body: TileBody,
    cache: Arc<dyn TileCache>,
    key: TileKey,
    buffer: Vec<u8>,
    failed: bool,
}

/// Tee `body` into a buffer and store it once the stream ends cleanly.
fn capture_body(body: TileBody, cache: Arc<dyn TileCache>, key: TileKey) -> TileBody {
    let capture = Capture {
        body,
        cache,
        key,
        buffer: Vec::new(),
        failed: false,
    };

    stream::unfold(Some(capture), |state| async move {
        let mut capture = state?;
        match capture.body.next().await {
            Some(Ok(chunk)) => {
                capture.buffer.extend_from_slice(&chunk);
                Some((Ok(chunk), Some(capture)))
            }
            Some(Err(e)) => {
                capture.failed = true;
                Some((Err(e), Some(capture)))
            }
            None => {
                store(capture).await;
                None
            }
        }
    })
    .boxed()
}

async fn store(capture: Capture) {
    if capture.failed {
        debug!(key = %capture.key, "Body failed, not caching");
        return;
    }
    if capture.buffer.is_empty() {
        debug!(key = %capture.key, "Empty tile, not caching");
        return;
    }

    let bytes = capture.buffer.len();
    if let Err(e) = capture.cache.set(&capture.key, capture.buffer).await {
        warn!(key = %capture.key, error = %e, "Cache write failed");
    } else {
        debug!(key = %capture.key, bytes, "Tile cached");
    }
}
