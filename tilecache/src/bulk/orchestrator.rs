//! Bulk run orchestration.
//!
//! # Design
//!
//! Every tile of a run is a unit of work spawned onto the runtime. A
//! semaphore with `max_concurrent` permits gates submission, so no more than
//! that many fetches are ever in flight for one run:
//!
//! 1. Acquire a permit, spawn the unit holding it
//! 2. The unit fetches under `tile_timeout` and counts itself exactly once
//! 3. After the last submission, wait for every unit (barrier)
//! 4. Emit the final snapshot and leave the registry
//!
//! A timeout counts as a failed tile and never stalls the run. Units publish
//! throttled progress while holding the task's progress lock, so updates
//! leave in counter order even though units finish in any order.
//!
//! Cancelling stops submission. Units already in flight run to completion
//! (their tiles may still land in the cache) but are not counted.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use super::broadcaster::ProgressBroadcaster;
use super::fetcher::{FetchRequest, TileFetcher};
use super::progress::ProgressSnapshot;
use super::registry::TaskRegistry;
use super::request::BulkRunPlan;
use super::task::{BroadcastThrottle, TaskState, TileTask};
use super::BulkError;
use crate::coord::TileCoord;
use crate::tile::TileError;

/// Default maximum concurrent tile fetches per run.
pub const DEFAULT_MAX_CONCURRENT: usize = 15;

/// Default timeout for a single tile fetch.
pub const DEFAULT_TILE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default capacity of the progress queue feeding the broadcaster.
pub const DEFAULT_PROGRESS_QUEUE_CAPACITY: usize = 256;

/// Default delay before the first progress update of a run.
///
/// Gives a client that just submitted the run time to subscribe.
pub const DEFAULT_INITIAL_BROADCAST_DELAY: Duration = Duration::from_millis(100);

/// Default map warmed by bulk runs.
pub const DEFAULT_BULK_MAP: &str = "inference_database";

/// Bulk run settings.
#[derive(Debug, Clone)]
pub struct BulkConfig {
    /// Maximum tile fetches in flight per run.
    pub max_concurrent: usize,
    /// Timeout for one tile fetch.
    pub tile_timeout: Duration,
    /// When intermediate progress is broadcast.
    pub throttle: BroadcastThrottle,
    /// Capacity of the progress queue.
    pub queue_capacity: usize,
    /// Delay before a run's first progress update.
    pub initial_broadcast_delay: Duration,
    /// Map whose tiles are requested.
    pub map_name: String,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            tile_timeout: DEFAULT_TILE_TIMEOUT,
            throttle: BroadcastThrottle::default(),
            queue_capacity: DEFAULT_PROGRESS_QUEUE_CAPACITY,
            initial_broadcast_delay: DEFAULT_INITIAL_BROADCAST_DELAY,
            map_name: DEFAULT_BULK_MAP.to_string(),
        }
    }
}

impl BulkConfig {
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_tile_timeout(mut self, timeout: Duration) -> Self {
        self.tile_timeout = timeout;
        self
    }

    pub fn with_throttle(mut self, throttle: BroadcastThrottle) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_initial_broadcast_delay(mut self, delay: Duration) -> Self {
        self.initial_broadcast_delay = delay;
        self
    }

    pub fn with_map_name(mut self, map_name: impl Into<String>) -> Self {
        self.map_name = map_name.into();
        self
    }
}

/// Outcome of one bulk run.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkRunSummary {
    pub task_id: String,
    pub total: u64,
    /// Attempted tiles, failures included.
    pub completed: u64,
    pub failed: u64,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl BulkRunSummary {
    pub fn succeeded(&self) -> u64 {
        self.completed - self.failed
    }
}

/// A run started in the background.
pub struct BulkRunHandle {
    task: Arc<TileTask>,
    join: JoinHandle<BulkRunSummary>,
}

impl BulkRunHandle {
    pub fn task(&self) -> &Arc<TileTask> {
        &self.task
    }

    pub fn task_id(&self) -> &str {
        self.task.id()
    }

    pub fn cancel(&self) {
        self.task.cancel();
    }

    /// Wait for the run to finish.
    pub async fn wait(self) -> Result<BulkRunSummary, BulkError> {
        self.join.await.map_err(|e| BulkError::Join(e.to_string()))
    }
}

struct Inner {
    fetcher: Arc<dyn TileFetcher>,
    registry: TaskRegistry,
    broadcaster: Arc<ProgressBroadcaster>,
    progress_tx: mpsc::Sender<ProgressSnapshot>,
    config: BulkConfig,
}

/// Starts, tracks and cancels bulk runs.
///
/// Cheap to clone; clones share the registry and progress queue.
#[derive(Clone)]
pub struct BulkOrchestrator {
    inner: Arc<Inner>,
}

impl BulkOrchestrator {
    /// Create an orchestrator and spawn its progress dispatcher.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        fetcher: Arc<dyn TileFetcher>,
        broadcaster: Arc<ProgressBroadcaster>,
        config: BulkConfig,
    ) -> Self {
        let (progress_tx, progress_rx) = mpsc::channel(config.queue_capacity);
        broadcaster.clone().spawn_dispatcher(progress_rx);

        Self {
            inner: Arc::new(Inner {
                fetcher,
                registry: TaskRegistry::new(),
                broadcaster,
                progress_tx,
                config,
            }),
        }
    }

    pub fn config(&self) -> &BulkConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.inner.registry
    }

    pub fn broadcaster(&self) -> &Arc<ProgressBroadcaster> {
        &self.inner.broadcaster
    }

    /// Start a run for `plan` in the background.
    pub fn start(&self, plan: &BulkRunPlan) -> BulkRunHandle {
        self.launch(Arc::new(TileTask::new(plan)))
    }

    /// Register `task` and run it in the background.
    pub fn launch(&self, task: Arc<TileTask>) -> BulkRunHandle {
        if self.inner.registry.register(task.clone()).is_some() {
            info!(
                task_id = %task.id(),
                "Task id already running, new run takes over its progress"
            );
        }

        let this = self.clone();
        let run_task = task.clone();
        let join = tokio::spawn(async move { this.run(run_task).await });

        BulkRunHandle { task, join }
    }

    /// Current progress of `task_id`.
    pub fn progress(&self, task_id: &str) -> ProgressSnapshot {
        self.inner.registry.progress(task_id)
    }

    /// Cancel the run registered under `task_id`.
    ///
    /// Returns `false` when no such run is registered.
    pub fn cancel(&self, task_id: &str) -> bool {
        match self.inner.registry.get(task_id) {
            Some(task) => {
                info!(task_id, "Cancelling bulk run");
                task.cancel();
                true
            }
            None => false,
        }
    }

    /// Run `task` to completion or cancellation.
    ///
    /// The caller is responsible for registering the task; it is removed
    /// from the registry when the run ends if it still owns its id.
    pub async fn run(&self, task: Arc<TileTask>) -> BulkRunSummary {
        let config = &self.inner.config;
        let started = Instant::now();
        let cancellation = task.cancel_token().clone();
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent));

        task.mark_running();
        info!(
            task_id = %task.id(),
            total = task.total(),
            zoom_levels = ?task.zoom_levels(),
            max_concurrent = config.max_concurrent,
            "Bulk run started"
        );

        let initial_delay = tokio::time::sleep(config.initial_broadcast_delay);
        tokio::pin!(initial_delay);
        let mut initial_sent = false;

        let mut units = JoinSet::new();
        let mut submitted = 0u64;

        'submit: for tile in task.tiles() {
            let permit = loop {
                tokio::select! {
                    biased;

                    _ = cancellation.cancelled() => break 'submit,

                    _ = &mut initial_delay, if !initial_sent => {
                        initial_sent = true;
                        self.publish_running(&task);
                    }

                    permit = semaphore.clone().acquire_owned() => match permit {
                        Ok(permit) => break permit,
                        Err(_) => break 'submit,
                    },
                }
            };

            let this = self.clone();
            let unit_task = task.clone();
            units.spawn(async move {
                let _permit = permit;
                this.run_unit(&unit_task, tile).await;
            });
            submitted += 1;

            while let Some(joined) = units.try_join_next() {
                log_unit_result(task.id(), joined);
            }
        }

        // Barrier: the final update happens after every unit has reported.
        loop {
            tokio::select! {
                biased;

                _ = &mut initial_delay, if !initial_sent => {
                    initial_sent = true;
                    self.publish_running(&task);
                }

                joined = units.join_next() => match joined {
                    Some(joined) => log_unit_result(task.id(), joined),
                    None => break,
                },
            }
        }

        let (completed, failed) = task.counts();
        let cancelled = cancellation.is_cancelled() && completed < task.total();

        // A run that beat the initial delay still holds its final update
        // until then, so a client subscribing right after submitting sees it.
        if !initial_sent && !cancelled {
            (&mut initial_delay).await;
        }

        let state = if cancelled {
            TaskState::Cancelled
        } else {
            TaskState::Completed
        };
        let final_snapshot = task.finish(state);
        if self.inner.progress_tx.send(final_snapshot).await.is_err() {
            debug!(task_id = %task.id(), "Progress dispatcher gone, final update dropped");
        }

        self.inner.registry.remove_if_current(&task);

        let summary = BulkRunSummary {
            task_id: task.id().to_string(),
            total: task.total(),
            completed,
            failed,
            cancelled,
            elapsed: started.elapsed(),
        };

        if cancelled {
            info!(
                task_id = %summary.task_id,
                completed,
                failed,
                submitted,
                total = summary.total,
                "Bulk run cancelled"
            );
        } else {
            info!(
                task_id = %summary.task_id,
                completed,
                failed,
                elapsed_ms = summary.elapsed.as_millis() as u64,
                "Bulk run complete"
            );
        }

        summary
    }

    /// One unit of work: fetch a tile and count it.
    async fn run_unit(&self, task: &TileTask, tile: TileCoord) {
        let success = self.fetch_tile(task.id(), tile).await;

        if task.is_cancelled() {
            debug!(task_id = %task.id(), tile = %tile, "Run cancelled, result discarded");
            return;
        }

        // The last tile's snapshot goes out as the final update instead.
        task.record_completion_then(success, &self.inner.config.throttle, |snapshot| {
            if snapshot.is_running {
                self.publish(snapshot.clone());
            }
        });
    }

    /// Fetch one tile. Returns whether it succeeded.
    async fn fetch_tile(&self, task_id: &str, tile: TileCoord) -> bool {
        let config = &self.inner.config;
        let request = FetchRequest::new(task_id, &config.map_name, tile);

        match tokio::time::timeout(config.tile_timeout, self.inner.fetcher.fetch(&request)).await {
            Ok(Ok(bytes)) => {
                debug!(task_id, tile = %tile, bytes, "Tile warmed");
                true
            }
            Ok(Err(e)) => {
                warn!(task_id, tile = %tile, error = %e, "Tile warm failed");
                false
            }
            Err(_) => {
                let e = TileError::Timeout(config.tile_timeout);
                warn!(task_id, tile = %tile, error = %e, "Tile warm timed out");
                false
            }
        }
    }

    /// Publish the current snapshot unless the run has already reached its
    /// final count.
    fn publish_running(&self, task: &TileTask) {
        task.snapshot_then(|snapshot| {
            if snapshot.is_running {
                self.publish(snapshot);
            }
        });
    }

    fn publish(&self, snapshot: ProgressSnapshot) {
        if let Err(e) = self.inner.progress_tx.try_send(snapshot) {
            debug!(error = %e, "Progress queue full, update dropped");
        }
    }
}

fn log_unit_result(task_id: &str, joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        warn!(task_id, error = %e, "Bulk unit did not finish");
    }
}
