//! Status endpoint.

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::{AppState, SERVER_VERSION};
use crate::bulk::TileTask;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    /// Cache backend name, or `none` when caching is disabled.
    pub cache: String,
    /// Bulk runs currently registered, sorted by id.
    pub active_tasks: Vec<ActiveTask>,
}

/// One registered bulk run as reported by the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveTask {
    pub task_id: String,
    pub started_at: DateTime<Utc>,
    /// `[min_lng, min_lat, max_lng, max_lat]`, absent for runs built from
    /// explicit ranges.
    pub bounds: Option<[f64; 4]>,
    pub zoom_levels: Vec<u32>,
    pub completed: u64,
    pub failed: u64,
    pub total: u64,
}

impl From<&TileTask> for ActiveTask {
    fn from(task: &TileTask) -> Self {
        let (completed, failed) = task.counts();
        Self {
            task_id: task.id().to_string(),
            started_at: task.started_at(),
            bounds: task.bounds().map(|bounds| bounds.to_array()),
            zoom_levels: task.zoom_levels().to_vec(),
            completed,
            failed,
            total: task.total(),
        }
    }
}

/// `GET /api/v1/status`
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let cache = state
        .middleware
        .cache()
        .map(|cache| cache.name().to_string())
        .unwrap_or_else(|| "none".to_string());

    Json(StatusResponse {
        status: "running".to_string(),
        version: SERVER_VERSION.to_string(),
        cache,
        active_tasks: state
            .orchestrator
            .registry()
            .tasks()
            .iter()
            .map(|task| ActiveTask::from(task.as_ref()))
            .collect(),
    })
}
