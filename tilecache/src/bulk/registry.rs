//! Registry of running bulk tasks, keyed by task id.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::progress::ProgressSnapshot;
use super::task::TileTask;

/// Running tasks by id.
///
/// A second run under an id that is already registered takes over the slot;
/// the earlier run keeps going but is no longer reachable by id. Removal
/// compares identity, so the earlier run finishing never evicts its
/// successor.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<String, Arc<TileTask>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `task`, returning the run it displaced, if any.
    pub fn register(&self, task: Arc<TileTask>) -> Option<Arc<TileTask>> {
        let previous = self.tasks.lock().insert(task.id().to_string(), task.clone());
        previous.filter(|previous| !Arc::ptr_eq(previous, &task))
    }

    pub fn get(&self, task_id: &str) -> Option<Arc<TileTask>> {
        self.tasks.lock().get(task_id).cloned()
    }

    /// Remove `task` if it still owns its id.
    pub fn remove_if_current(&self, task: &Arc<TileTask>) -> bool {
        let mut tasks = self.tasks.lock();
        match tasks.get(task.id()) {
            Some(current) if Arc::ptr_eq(current, task) => {
                tasks.remove(task.id());
                true
            }
            _ => false,
        }
    }

    /// Progress of `task_id`, or a not-running snapshot when unknown.
    pub fn progress(&self, task_id: &str) -> ProgressSnapshot {
        match self.get(task_id) {
            Some(task) => task.snapshot(),
            None => ProgressSnapshot::not_running(task_id),
        }
    }

    /// Every registered task, sorted by id.
    pub fn tasks(&self) -> Vec<Arc<TileTask>> {
        let mut tasks: Vec<Arc<TileTask>> = self.tasks.lock().values().cloned().collect();
        tasks.sort_by(|a, b| a.id().cmp(b.id()));
        tasks
    }

    /// Snapshots of every registered task, sorted by id.
    pub fn snapshots(&self) -> Vec<ProgressSnapshot> {
        self.tasks().iter().map(|task| task.snapshot()).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TileRange;

    fn task(id: &str) -> Arc<TileTask> {
        Arc::new(TileTask::from_ranges(
            id,
            vec![TileRange {
                zoom: 1,
                x_min: 0,
                x_max: 1,
                y_min: 0,
                y_max: 0,
            }],
        ))
    }

    #[test]
    fn test_register_and_get() {
        let registry = TaskRegistry::new();
        assert!(registry.register(task("a")).is_none());

        assert_eq!(registry.get("a").unwrap().total(), 2);
        assert!(registry.get("b").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_task_progress_is_not_running() {
        let registry = TaskRegistry::new();
        let snapshot = registry.progress("missing");
        assert_eq!(snapshot.task_id, "missing");
        assert!(!snapshot.is_running);
    }

    #[test]
    fn test_second_run_takes_over_slot() {
        let registry = TaskRegistry::new();
        let first = task("a");
        let second = task("a");

        registry.register(first.clone());
        let displaced = registry.register(second.clone()).unwrap();
        assert!(Arc::ptr_eq(&displaced, &first));

        // The earlier run finishing must not evict the later one.
        assert!(!registry.remove_if_current(&first));
        assert!(Arc::ptr_eq(&registry.get("a").unwrap(), &second));

        assert!(registry.remove_if_current(&second));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reregistering_same_task_displaces_nothing() {
        let registry = TaskRegistry::new();
        let a = task("a");
        registry.register(a.clone());
        assert!(registry.register(a).is_none());
    }

    #[test]
    fn test_tasks_sorted_by_id() {
        let registry = TaskRegistry::new();
        registry.register(task("b"));
        registry.register(task("a"));

        let ids: Vec<_> = registry.tasks().iter().map(|t| t.id().to_string()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        let ids: Vec<_> = registry.snapshots().into_iter().map(|s| s.task_id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
