//! Bulk run requests.
//!
//! The wire request is deliberately loose (`bounds` is any JSON array) so
//! that a wrong-length array reaches validation and produces a client error
//! rather than a deserialization failure.

use serde::{Deserialize, Serialize};

use super::BulkError;
use crate::coord::{self, Bounds, TileRange, MAX_ZOOM};

/// Body of a bulk run request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkRunRequest {
    /// `false` asks to stop the task instead of starting it.
    #[serde(rename = "isSlice", default)]
    pub is_slice: bool,
    #[serde(default)]
    pub task_id: String,
    /// `[min_lng, min_lat, max_lng, max_lat]`
    #[serde(default)]
    pub bounds: Vec<f64>,
    #[serde(default)]
    pub minzoom: u32,
    #[serde(default)]
    pub maxzoom: u32,
}

/// A validated bulk run.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkRunPlan {
    pub task_id: String,
    /// Bounds with each axis sorted.
    pub bounds: Bounds,
    /// Zoom levels in ascending order.
    pub zoom_levels: Vec<u32>,
}

impl BulkRunRequest {
    /// Validate the request into a plan.
    ///
    /// # Errors
    ///
    /// - `BulkError::InvalidBounds` unless `bounds` has exactly four values
    /// - `BulkError::InvalidTaskId` for an empty task id
    /// - `BulkError::InvalidZoom` for a zoom above [`MAX_ZOOM`]
    pub fn validate(&self) -> Result<BulkRunPlan, BulkError> {
        let bounds =
            Bounds::from_slice(&self.bounds).ok_or(BulkError::InvalidBounds(self.bounds.len()))?;

        let task_id = self.task_id.trim();
        if task_id.is_empty() {
            return Err(BulkError::InvalidTaskId(self.task_id.clone()));
        }

        for zoom in [self.minzoom, self.maxzoom] {
            if zoom > MAX_ZOOM {
                return Err(BulkError::InvalidZoom(zoom));
            }
        }

        Ok(BulkRunPlan {
            task_id: task_id.to_string(),
            bounds: bounds.normalized(),
            zoom_levels: coord::zoom_levels(self.minzoom, self.maxzoom),
        })
    }
}

impl BulkRunPlan {
    pub fn new(task_id: impl Into<String>, bounds: Bounds, zoom_levels: Vec<u32>) -> Self {
        Self {
            task_id: task_id.into(),
            bounds: bounds.normalized(),
            zoom_levels,
        }
    }

    /// One tile range per zoom level.
    pub fn ranges(&self) -> Vec<TileRange> {
        self.zoom_levels
            .iter()
            .map(|&zoom| TileRange::covering(&self.bounds, zoom))
            .collect()
    }

    pub fn total_tiles(&self) -> u64 {
        coord::total_tiles(&self.bounds, &self.zoom_levels)
    }
}
