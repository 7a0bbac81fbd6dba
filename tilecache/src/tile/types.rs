//! Tile response and error types.

use std::fmt;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt};
use thiserror::Error;

use crate::cache::KeyError;
use crate::sql::TemplateError;

/// Content type of Mapbox vector tiles.
pub const MVT_CONTENT_TYPE: &str = "application/vnd.mapbox-vector-tile";

/// Errors that can occur while producing a tile.
#[derive(Debug, Error)]
pub enum TileError {
    /// The request path does not address a tile.
    #[error("Invalid tile request: {0}")]
    InvalidRequest(#[from] KeyError),

    /// No map with the requested name is configured.
    #[error("Unknown map '{0}'")]
    UnknownMap(String),

    /// The upstream tile server failed or answered with an error.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// The tile query failed.
    #[error("Database error: {0}")]
    Database(String),

    /// The tile query template could not be rewritten.
    #[error("Query template error: {0}")]
    Template(#[from] TemplateError),

    /// Reading the response body failed part-way.
    #[error("Body error: {0}")]
    Body(String),

    /// Generation did not finish within its deadline.
    #[error("Tile generation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl TileError {
    /// Classify a failed HTTP request, keeping client timeouts distinct.
    pub fn from_request(err: reqwest::Error, timeout: std::time::Duration) -> Self {
        if err.is_timeout() {
            TileError::Timeout(timeout)
        } else {
            TileError::Upstream(format!("Request failed: {}", err))
        }
    }
}

/// Streaming tile body.
pub type TileBody = BoxStream<'static, Result<Bytes, TileError>>;

/// Whether a response came from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    /// Header value (`HIT` / `MISS`).
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A produced tile: status, content type and a body that may still be
/// streaming from the generator.
pub struct TileResponse {
    /// HTTP-equivalent status code.
    pub status: u16,
    pub content_type: Option<String>,
    /// Set by the cache middleware; `None` when caching was bypassed.
    pub cache_status: Option<CacheStatus>,
    pub body: TileBody,
}

impl TileResponse {
    /// A complete 200 response.
    pub fn ok(body: impl Into<Bytes>, content_type: &str) -> Self {
        let body: Bytes = body.into();
        Self {
            status: 200,
            content_type: Some(content_type.to_string()),
            cache_status: None,
            body: stream::once(async move { Ok(body) }).boxed(),
        }
    }

    /// A response whose body is produced incrementally.
    pub fn streaming(status: u16, content_type: Option<String>, body: TileBody) -> Self {
        Self {
            status,
            content_type,
            cache_status: None,
            body,
        }
    }

    /// A bodyless response with the given status.
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            content_type: None,
            cache_status: None,
            body: stream::empty().boxed(),
        }
    }

    pub fn with_cache_status(mut self, status: CacheStatus) -> Self {
        self.cache_status = Some(status);
        self
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Drain the body into one buffer.
    pub async fn into_bytes(self) -> Result<Bytes, TileError> {
        let mut body = self.body;
        let mut buffer = BytesMut::new();
        while let Some(chunk) = body.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        Ok(buffer.freeze())
    }
}

impl fmt::Debug for TileResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("cache_status", &self.cache_status)
            .finish_non_exhaustive()
    }
}
