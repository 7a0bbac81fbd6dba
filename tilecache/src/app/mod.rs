//! Application bootstrap and lifecycle.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        TileCacheApp                           │
//! │                                                               │
//! │  1. build_cache ───────────► Option<Arc<dyn TileCache>>       │
//! │  2. generator ─────────────► Upstream | PostGIS               │
//! │  3. TileCacheMiddleware (cache + cacheable params)            │
//! │  4. ProgressBroadcaster ──┐                                   │
//! │  5. TileFetcher ──────────┴► BulkOrchestrator (+ dispatcher)  │
//! │  6. AppState ──────────────► axum router                      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tilecache::app::TileCacheApp;
//! use tilecache::config::ConfigFile;
//!
//! let app = TileCacheApp::start(ConfigFile::load()?).await?;
//! app.serve(shutdown_token).await?;
//! ```

mod bootstrap;
mod error;

pub use bootstrap::TileCacheApp;
pub use error::AppError;
