//! Bulk cache warming.
//!
//! A bulk run requests every tile covering a bounding box across a range of
//! zoom levels, so that later interactive requests are cache hits. Progress
//! is pushed to subscribers as the run advances.
//!
//! # Architecture
//!
//! ```text
//! BulkRunRequest ──validate──► BulkRunPlan ──► TileTask (ranges, counters)
//!                                                   │
//!                                   BulkOrchestrator::start
//!                                                   │
//!                         ┌─────────────────────────┼──────────────────────┐
//!                         ▼                         ▼                      ▼
//!                   TaskRegistry            TileFetcher (window)    progress queue
//!                  (id → task)          HTTP or in-process via          │
//!                                       TileCacheMiddleware             ▼
//!                                                              ProgressBroadcaster
//!                                                               (per-task subs)
//! ```
//!
//! # Example
//!
//! ```ignore
//! let orchestrator = BulkOrchestrator::new(fetcher, broadcaster, BulkConfig::default());
//! let plan = request.validate()?;
//! let handle = orchestrator.start(&plan);
//! let summary = handle.wait().await?;
//! ```

mod broadcaster;
mod fetcher;
mod orchestrator;
mod progress;
mod registry;
mod request;
mod task;

pub use broadcaster::{ProgressBroadcaster, SubscriberId, Subscription, DEFAULT_SUBSCRIBER_CAPACITY};
pub use fetcher::{
    FetchRequest, HttpTileFetcher, MiddlewareTileFetcher, TileFetcher, DEFAULT_FETCH_BASE_URL,
};
pub use orchestrator::{
    BulkConfig, BulkOrchestrator, BulkRunHandle, BulkRunSummary, DEFAULT_BULK_MAP,
    DEFAULT_INITIAL_BROADCAST_DELAY, DEFAULT_MAX_CONCURRENT, DEFAULT_PROGRESS_QUEUE_CAPACITY,
    DEFAULT_TILE_TIMEOUT,
};
pub use progress::{percentage, ProgressSnapshot};
pub use registry::TaskRegistry;
pub use request::{BulkRunPlan, BulkRunRequest};
pub use task::{
    BroadcastThrottle, TaskState, TileTask, DEFAULT_BROADCAST_PERCENT_STEP,
    DEFAULT_BROADCAST_TILE_STEP,
};

use thiserror::Error;

use crate::coord::MAX_ZOOM;

/// Errors from bulk run requests and runs.
#[derive(Debug, Error)]
pub enum BulkError {
    /// Bounds did not hold exactly four values.
    #[error("bounds must have exactly 4 values, got {0}")]
    InvalidBounds(usize),

    #[error("invalid task id '{0}'")]
    InvalidTaskId(String),

    #[error("zoom {0} exceeds maximum of {max}", max = MAX_ZOOM)]
    InvalidZoom(u32),

    /// The background run panicked or was aborted.
    #[error("bulk run failed: {0}")]
    Join(String),
}
