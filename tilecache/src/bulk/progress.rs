//! Progress snapshots pushed to subscribers.

use serde::{Deserialize, Serialize};

/// Point-in-time progress of one bulk run.
///
/// Serializes as
/// `{"type":"progress","task_id":..,"completed":..,"total":..,"percentage":..,"isRunning":..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "progress")]
pub struct ProgressSnapshot {
    pub task_id: String,
    pub completed: u64,
    pub total: u64,
    /// Completed share in percent, two decimals.
    pub percentage: f64,
    #[serde(rename = "isRunning")]
    pub is_running: bool,
}

impl ProgressSnapshot {
    pub fn new(task_id: impl Into<String>, completed: u64, total: u64, is_running: bool) -> Self {
        Self {
            task_id: task_id.into(),
            completed,
            total,
            percentage: percentage(completed, total),
            is_running,
        }
    }

    /// Snapshot for a task that is unknown or already finished.
    pub fn not_running(task_id: impl Into<String>) -> Self {
        Self::new(task_id, 0, 0, false)
    }
}

/// `completed / total` in percent, rounded to two decimals. Zero when
/// `total` is zero.
pub fn percentage(completed: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = completed as f64 / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let snapshot = ProgressSnapshot::new("t1", 5, 20, true);
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "type": "progress",
                "task_id": "t1",
                "completed": 5,
                "total": 20,
                "percentage": 25.0,
                "isRunning": true
            })
        );
    }

    #[test]
    fn test_parse_wire_format() {
        let json = r#"{"type":"progress","task_id":"t1","completed":1,"total":3,"percentage":33.33,"isRunning":true}"#;
        let snapshot: ProgressSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot, ProgressSnapshot::new("t1", 1, 3, true));
    }

    #[test]
    fn test_not_running_snapshot() {
        let snapshot = ProgressSnapshot::not_running("gone");
        assert_eq!(snapshot.completed, 0);
        assert_eq!(snapshot.total, 0);
        assert_eq!(snapshot.percentage, 0.0);
        assert!(!snapshot.is_running);
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(3, 3), 100.0);
        assert_eq!(percentage(0, 0), 0.0);
    }
}
