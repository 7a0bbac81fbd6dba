//! TileGenerator trait for abstracting tile sources.
//!
//! A generator turns a [`TileRequest`] into encoded tile bytes. The cache
//! middleware wraps any generator; the bulk orchestrator drives one through
//! the middleware.
//!
//! # Implementors
//!
//! - [`UpstreamTileGenerator`](super::UpstreamTileGenerator) - proxies an upstream tile server
//! - [`PostgisTileGenerator`](super::PostgisTileGenerator) - runs a map's SQL template against PostGIS

use crate::cache::BoxFuture;
use crate::tile::{TileError, TileRequest, TileResponse};

/// Trait for tile generation strategies.
///
/// Implementations must be `Send + Sync`; one generator serves every
/// concurrent request.
pub trait TileGenerator: Send + Sync {
    /// Produce the tile for `request`.
    ///
    /// A non-success `status` on the returned response is a valid outcome
    /// (for example a 404 from upstream); `Err` is reserved for failures
    /// that leave no response at all.
    fn generate<'a>(
        &'a self,
        request: &'a TileRequest,
    ) -> BoxFuture<'a, Result<TileResponse, TileError>>;
}
