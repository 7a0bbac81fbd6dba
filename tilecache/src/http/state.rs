//! Shared state for HTTP handlers.

use std::sync::Arc;

use crate::bulk::BulkOrchestrator;
use crate::cache::TileCacheMiddleware;
use crate::tile::TileGenerator;

/// Version reported by the status endpoint.
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Handles every route needs. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Read-through cache in front of `generator`.
    pub middleware: Arc<TileCacheMiddleware>,
    /// Produces tiles on a cache miss.
    pub generator: Arc<dyn TileGenerator>,
    /// Bulk runs and their progress.
    pub orchestrator: BulkOrchestrator,
}

impl AppState {
    pub fn new(
        middleware: Arc<TileCacheMiddleware>,
        generator: Arc<dyn TileGenerator>,
        orchestrator: BulkOrchestrator,
    ) -> Self {
        Self {
            middleware,
            generator,
            orchestrator,
        }
    }
}
