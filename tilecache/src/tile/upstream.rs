//! Upstream tile server proxy.
//!
//! Forwards the tile path and raw query to another tile server and streams
//! its body back. The upstream's status is passed through untouched, so a
//! 404 upstream is a 404 here (and is never cached).

use std::time::Duration;

use futures::StreamExt;
use tracing::debug;
use url::Url;

use crate::cache::BoxFuture;
use crate::tile::{TileError, TileGenerator, TileRequest, TileResponse};

/// Default timeout for upstream requests.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Generator that proxies tiles from an upstream server.
pub struct UpstreamTileGenerator {
    client: reqwest::Client,
    timeout: Duration,
    /// Base URL the tile path is appended to, e.g. `http://tiles:8080/maps`.
    base_url: String,
}

impl UpstreamTileGenerator {
    /// Create a proxy for `base_url` with the default timeout.
    pub fn new(base_url: &str) -> Result<Self, TileError> {
        Self::with_timeout(base_url, DEFAULT_UPSTREAM_TIMEOUT)
    }

    /// Create a proxy with a custom request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, TileError> {
        Url::parse(base_url)
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

    /// Full upstream URL for a request.
    pub fn url_for(&self, request: &TileRequest) -> String {
        match request.query() {
            Some(query) => format!("{}{}?{}", self.base_url, request.path(), query),
            None => format!("{}{}", self.base_url, request.path()),
        }
    }
}

impl TileGenerator for UpstreamTileGenerator {
    fn generate<'a>(
        &'a self,
        request: &'a TileRequest,
    ) -> BoxFuture<'a, Result<TileResponse, TileError>> {
        Box::pin(async move {
            let url = self.url_for(request);
            debug!(url = %url, "Fetching upstream tile");

            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| TileError::from_request(e, self.timeout))?;

            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let body = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(|e| TileError::Body(e.to_string())))
                .boxed();

            Ok(TileResponse::streaming(status, content_type, body))
        })
    }
}
