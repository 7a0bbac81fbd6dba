//! One bulk run and its progress counters.

use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::progress::ProgressSnapshot;
use super::request::BulkRunPlan;
use crate::coord::{Bounds, TileCoord, TileRange};

/// Default number of completions between broadcasts.
pub const DEFAULT_BROADCAST_TILE_STEP: u64 = 10;

/// Default percentage advance between broadcasts.
pub const DEFAULT_BROADCAST_PERCENT_STEP: f64 = 5.0;

/// Lifecycle of a bulk run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Cancelled,
}

impl TaskState {
    pub fn is_finished(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Cancelled)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Completed => "completed",
            TaskState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// When an intermediate progress update is worth sending.
///
/// An update goes out when at least `tile_step` tiles completed since the
/// last one, when the percentage advanced by at least `percent_step`, or on
/// the final tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BroadcastThrottle {
    pub tile_step: u64,
    pub percent_step: f64,
}

impl Default for BroadcastThrottle {
    fn default() -> Self {
        Self {
            tile_step: DEFAULT_BROADCAST_TILE_STEP,
            percent_step: DEFAULT_BROADCAST_PERCENT_STEP,
        }
    }
}

impl BroadcastThrottle {
    pub fn should_broadcast(&self, completed: u64, last_broadcast: u64, total: u64) -> bool {
        if completed >= total {
            return true;
        }
        let advanced = completed.saturating_sub(last_broadcast);
        if advanced >= self.tile_step {
            return true;
        }
        if total == 0 {
            return false;
        }
        let percent_advance = advanced as f64 / total as f64 * 100.0;
        percent_advance >= self.percent_step
    }
}

#[derive(Debug)]
struct Progress {
    completed: u64,
    failed: u64,
    last_broadcast: u64,
    state: TaskState,
}

/// A bulk run: its tile set, cancellation token and progress.
///
/// Counters sit behind one lock so a snapshot never mixes values from two
/// different completions. `completed` counts every attempted tile whatever
/// its outcome; `failed` is the subset that did not produce a tile.
pub struct TileTask {
    id: String,
    bounds: Option<Bounds>,
    zoom_levels: Vec<u32>,
    ranges: Vec<TileRange>,
    total: u64,
    started_at: DateTime<Utc>,
    cancel: CancellationToken,
    progress: Mutex<Progress>,
}

impl TileTask {
    /// Build a task covering `plan` at each of its zoom levels.
    pub fn new(plan: &BulkRunPlan) -> Self {
        let mut task = Self::from_ranges(&plan.task_id, plan.ranges());
        task.bounds = Some(plan.bounds);
        task
    }

    /// Build a task from explicit per-zoom ranges.
    pub fn from_ranges(id: impl Into<String>, ranges: Vec<TileRange>) -> Self {
        let total = ranges.iter().map(TileRange::tile_count).sum();
        let mut zoom_levels: Vec<u32> = ranges.iter().map(|r| r.zoom).collect();
        zoom_levels.dedup();

        Self {
            id: id.into(),
            bounds: None,
            zoom_levels,
            ranges,
            total,
            started_at: Utc::now(),
            cancel: CancellationToken::new(),
            progress: Mutex::new(Progress {
                completed: 0,
                failed: 0,
                last_broadcast: 0,
                state: TaskState::Pending,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn zoom_levels(&self) -> &[u32] {
        &self.zoom_levels
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn state(&self) -> TaskState {
        self.progress.lock().state
    }

    /// Completed and failed counts.
    pub fn counts(&self) -> (u64, u64) {
        let progress = self.progress.lock();
        (progress.completed, progress.failed)
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Request cancellation. No further tiles are submitted; tiles already
    /// in flight finish but are no longer counted.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Every tile of the task, zoom by zoom.
    pub fn tiles(&self) -> impl Iterator<Item = TileCoord> + '_ {
        self.ranges.iter().flat_map(|range| range.iter())
    }

    pub fn mark_running(&self) {
        let mut progress = self.progress.lock();
        if progress.state == TaskState::Pending {
            progress.state = TaskState::Running;
        }
    }

    /// Count one finished tile.
    ///
    /// Returns a snapshot when the throttle says this completion is worth
    /// broadcasting.
    pub fn record_completion(
        &self,
        success: bool,
        throttle: &BroadcastThrottle,
    ) -> Option<ProgressSnapshot> {
        self.record_completion_then(success, throttle, |_| {})
    }

    /// Like [`record_completion`](Self::record_completion), running
    /// `on_broadcast` with the snapshot before the progress lock is released.
    ///
    /// `on_broadcast` must not block. Calling it under the lock keeps
    /// concurrent completions from publishing out of counter order.
    pub fn record_completion_then<F>(
        &self,
        success: bool,
        throttle: &BroadcastThrottle,
        on_broadcast: F,
    ) -> Option<ProgressSnapshot>
    where
        F: FnOnce(&ProgressSnapshot),
    {
        let mut progress = self.progress.lock();
        progress.completed += 1;
        if !success {
            progress.failed += 1;
        }

        if !throttle.should_broadcast(progress.completed, progress.last_broadcast, self.total) {
            return None;
        }
        progress.last_broadcast = progress.completed;
        let snapshot = self.snapshot_of(&progress);
        on_broadcast(&snapshot);
        Some(snapshot)
    }

    /// Move to a terminal state and return the final snapshot.
    pub fn finish(&self, state: TaskState) -> ProgressSnapshot {
        let mut progress = self.progress.lock();
        progress.state = state;
        progress.last_broadcast = progress.completed;
        self.snapshot_of(&progress)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let progress = self.progress.lock();
        self.snapshot_of(&progress)
    }

    /// Take a snapshot and hand it to `f` while holding the progress lock.
    pub fn snapshot_then<R>(&self, f: impl FnOnce(ProgressSnapshot) -> R) -> R {
        let progress = self.progress.lock();
        f(self.snapshot_of(&progress))
    }

    fn snapshot_of(&self, progress: &Progress) -> ProgressSnapshot {
        let is_running = !progress.state.is_finished() && progress.completed < self.total;
        ProgressSnapshot::new(&self.id, progress.completed, self.total, is_running)
    }
}

impl fmt::Debug for TileTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileTask")
            .field("id", &self.id)
            .field("zoom_levels", &self.zoom_levels)
            .field("total", &self.total)
            .field("state", &self.state())
            .finish()
    }
}
