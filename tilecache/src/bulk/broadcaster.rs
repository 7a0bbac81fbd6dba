//! Fan-out of progress snapshots to per-task subscribers.
//!
//! # Design
//!
//! Producers never wait on subscribers. The orchestrator hands snapshots to
//! a bounded queue; a single dispatcher task drains it and delivers to every
//! subscriber of the snapshot's task with `try_send`. A subscriber whose
//! channel is closed is dropped; a subscriber whose channel is full misses
//! that update.
//!
//! ```text
//! orchestrator ──try_send──► mpsc(queue) ──► dispatcher ──► subscribers[task_id]
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::progress::ProgressSnapshot;

/// Default capacity of each subscriber channel.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 64;

/// Identifies one subscription.
pub type SubscriberId = u64;

/// A live subscription to one task's progress.
///
/// Dropping the receiver is enough to unsubscribe; the entry is pruned on
/// the next publish for that task.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    pub task_id: String,
    pub receiver: mpsc::Receiver<ProgressSnapshot>,
}

/// Per-task subscriber lists.
#[derive(Debug, Default)]
pub struct ProgressBroadcaster {
    subscribers: DashMap<String, HashMap<SubscriberId, mpsc::Sender<ProgressSnapshot>>>,
    next_id: AtomicU64,
}

impl ProgressBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `task_id` with a fresh channel.
    pub fn subscribe(&self, task_id: &str) -> Subscription {
        let (tx, rx) = mpsc::channel(DEFAULT_SUBSCRIBER_CAPACITY);
        let id = self.attach(task_id, tx);
        Subscription {
            id,
            task_id: task_id.to_string(),
            receiver: rx,
        }
    }

    /// Subscribe an existing sender to `task_id`.
    ///
    /// One connection can follow several tasks by attaching the same sender
    /// more than once.
    pub fn attach(&self, task_id: &str, sender: mpsc::Sender<ProgressSnapshot>) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .entry(task_id.to_string())
            .or_default()
            .insert(id, sender);
        debug!(task_id, subscriber = id, "Progress subscriber attached");
        id
    }

    /// Remove a subscriber from every task it follows.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.retain(|_, subs| {
            subs.remove(&id);
            !subs.is_empty()
        });
    }

    /// Deliver `snapshot` to the subscribers of its task.
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, snapshot: &ProgressSnapshot) -> usize {
        let mut delivered = 0;
        let mut now_empty = false;

        if let Some(mut subs) = self.subscribers.get_mut(&snapshot.task_id) {
            subs.retain(|id, sender| match sender.try_send(snapshot.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    trace!(subscriber = *id, "Progress subscriber lagging, update skipped");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(subscriber = *id, "Progress subscriber gone");
                    false
                }
            });
            now_empty = subs.is_empty();
        }

        if now_empty {
            self.subscribers
                .remove_if(&snapshot.task_id, |_, subs| subs.is_empty());
        }

        delivered
    }

    /// Number of subscribers following `task_id`.
    pub fn subscriber_count(&self, task_id: &str) -> usize {
        self.subscribers
            .get(task_id)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }

    /// Spawn the dispatcher draining `queue` into this broadcaster.
    ///
    /// The task ends when every queue sender is dropped.
    pub fn spawn_dispatcher(
        self: Arc<Self>,
        mut queue: mpsc::Receiver<ProgressSnapshot>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(snapshot) = queue.recv().await {
                let delivered = self.publish(&snapshot);
                trace!(
                    task_id = %snapshot.task_id,
                    completed = snapshot.completed,
                    delivered,
                    "Progress dispatched"
                );
            }
            debug!("Progress dispatcher stopped");
        })
    }
}
