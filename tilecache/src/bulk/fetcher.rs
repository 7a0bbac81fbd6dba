//! How a bulk run requests one tile.
//!
//! Two fetchers are provided:
//!
//! - [`HttpTileFetcher`] requests tiles from a running server over HTTP, the
//!   same path an external client would take.
//! - [`MiddlewareTileFetcher`] goes straight through the cache middleware
//!   and generator in-process.
//!
//! Either way, a tile that is fully read ends up in the cache through the
//! normal read-through path; nothing writes to the cache directly.

use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use crate::cache::{BoxFuture, TileCacheMiddleware};
use crate::coord::TileCoord;
use crate::tile::{TileError, TileGenerator, TileRequest};

/// Default base URL of the tile server warmed over HTTP.
pub const DEFAULT_FETCH_BASE_URL: &str = "http://127.0.0.1:19089";

/// One tile of one bulk run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub task_id: String,
    pub map_name: String,
    pub tile: TileCoord,
}

impl FetchRequest {
    pub fn new(task_id: impl Into<String>, map_name: impl Into<String>, tile: TileCoord) -> Self {
        Self {
            task_id: task_id.into(),
            map_name: map_name.into(),
            tile,
        }
    }

    /// The tile request carrying the run's task id.
    pub fn tile_request(&self) -> TileRequest {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("task_id", &self.task_id)
            .finish();
        TileRequest::for_tile(
            &self.map_name,
            self.tile.zoom,
            self.tile.x,
            self.tile.y,
            "pbf",
        )
        .with_query(query)
    }
}

/// Fetches tiles for bulk runs.
///
/// Returns the number of body bytes read. Any non-2xx answer is an error.
pub trait TileFetcher: Send + Sync {
    fn fetch<'a>(&'a self, request: &'a FetchRequest) -> BoxFuture<'a, Result<usize, TileError>>;
}

/// Fetches tiles from a running tile server over HTTP.
pub struct HttpTileFetcher {
    client: reqwest::Client,
    timeout: Duration,
    base_url: String,
}

impl HttpTileFetcher {
    /// Create a fetcher for the server at `base_url`.
    ///
    /// `timeout` bounds each whole request including its body.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TileError> {
        url::Url::parse(base_url)
            .map_err(|e| TileError::Upstream(format!("invalid base url '{}': {}", base_url, e)))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TileError::Upstream(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `{base}/maps/{map}/{z}/{x}/{y}.pbf?task_id={id}`
    pub fn url_for(&self, request: &FetchRequest) -> String {
        let tile = request.tile_request();
        match tile.query() {
            Some(query) => format!("{}/maps{}?{}", self.base_url, tile.path(), query),
            None => format!("{}/maps{}", self.base_url, tile.path()),
        }
    }
}

impl TileFetcher for HttpTileFetcher {
    fn fetch<'a>(&'a self, request: &'a FetchRequest) -> BoxFuture<'a, Result<usize, TileError>> {
        Box::pin(async move {
            let url = self.url_for(request);
            trace!(url = %url, "Warming tile over HTTP");

            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| TileError::from_request(e, self.timeout))?;

            let status = response.status();
            if !status.is_success() {
                return Err(TileError::Upstream(format!("HTTP {} from {}", status, url)));
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| TileError::Body(e.to_string()))?;
            Ok(body.len())
        })
    }
}

/// Fetches tiles in-process through the cache middleware.
pub struct MiddlewareTileFetcher {
    middleware: Arc<TileCacheMiddleware>,
    generator: Arc<dyn TileGenerator>,
}

impl MiddlewareTileFetcher {
    pub fn new(middleware: Arc<TileCacheMiddleware>, generator: Arc<dyn TileGenerator>) -> Self {
        Self {
            middleware,
            generator,
        }
    }
}

impl TileFetcher for MiddlewareTileFetcher {
    fn fetch<'a>(&'a self, request: &'a FetchRequest) -> BoxFuture<'a, Result<usize, TileError>> {
        Box::pin(async move {
            let tile_request = request.tile_request();
            let response = self
                .middleware
                .serve(&tile_request, self.generator.as_ref())
                .await?;

            if !response.is_success() {
                return Err(TileError::Upstream(format!(
                    "HTTP {} for {}",
                    response.status,
                    tile_request.path()
                )));
            }

            // Draining the body is what commits a captured tile to the cache.
            let body = response.into_bytes().await?;
            Ok(body.len())
        })
    }
}
