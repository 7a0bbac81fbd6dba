//! Bulk run ingress and progress queries.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use tracing::info;

use super::error::{ApiError, ApiMessage};
use super::state::AppState;
use crate::bulk::{BulkRunRequest, ProgressSnapshot};

/// `POST /api/sliceTiles`
///
/// Starts a bulk run, or with `isSlice: false` stops the run registered
/// under the task id. Returns as soon as the run is scheduled.
pub async fn slice_tiles(
    State(state): State<AppState>,
    payload: Result<Json<BulkRunRequest>, JsonRejection>,
) -> Result<Json<ApiMessage>, ApiError> {
    let Json(request) = payload?;
    let plan = request.validate()?;

    info!(
        task_id = %plan.task_id,
        is_slice = request.is_slice,
        bounds = %plan.bounds,
        zoom_levels = ?plan.zoom_levels,
        "Bulk run request"
    );

    if !request.is_slice {
        let stopped = state.orchestrator.cancel(&plan.task_id);
        info!(task_id = %plan.task_id, stopped, "Bulk run stop requested");
        return Ok(Json(ApiMessage::ok("slicing stopped").with_is_slice(false)));
    }

    let handle = state.orchestrator.start(&plan);
    info!(
        task_id = %handle.task_id(),
        total = handle.task().total(),
        "Bulk run scheduled"
    );

    Ok(Json(
        ApiMessage::ok("slicing started, please wait").with_is_slice(true),
    ))
}

/// `GET /api/tasks/:task_id/progress`
pub async fn task_progress(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Json<ProgressSnapshot> {
    Json(state.orchestrator.progress(&task_id))
}
