//! Integration tests for bulk cache warming.
//!
//! These tests drive complete runs through the in-process path:
//! request validation → orchestrator → middleware → memory cache, with a
//! broadcaster subscription observing progress.
//!
//! Run with: `cargo test --test bulk_warming_integration`

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use tilecache::bulk::{
    BulkConfig, BulkOrchestrator, BulkRunRequest, MiddlewareTileFetcher, ProgressBroadcaster,
    ProgressSnapshot,
};
use tilecache::cache::{
    BoxFuture, MemoryCacheConfig, MemoryTileCache, TileCache, TileCacheMiddleware, TileKey,
};
use tilecache::tile::{TileError, TileGenerator, TileRequest, TileResponse, MVT_CONTENT_TYPE};

// ============================================================================
// Helpers
// ============================================================================

/// Generator that records every path it renders.
#[derive(Default)]
struct RecordingGenerator {
    calls: AtomicUsize,
    paths: Mutex<HashSet<String>>,
}

impl TileGenerator for RecordingGenerator {
    fn generate<'a>(
        &'a self,
        request: &'a TileRequest,
    ) -> BoxFuture<'a, Result<TileResponse, TileError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.paths.lock().insert(request.path().to_string());
            tokio::time::sleep(Duration::from_millis(1)).await;
            Ok(TileResponse::ok(
                request.path().as_bytes().to_vec(),
                MVT_CONTENT_TYPE,
            ))
        })
    }
}

struct Harness {
    cache: Arc<dyn TileCache>,
    generator: Arc<RecordingGenerator>,
    orchestrator: BulkOrchestrator,
}

fn harness() -> Harness {
    let cache: Arc<dyn TileCache> = Arc::new(MemoryTileCache::new(&MemoryCacheConfig::default()));
    let middleware = Arc::new(TileCacheMiddleware::new(Some(cache.clone())));
    let generator = Arc::new(RecordingGenerator::default());
    let fetcher = Arc::new(MiddlewareTileFetcher::new(middleware, generator.clone()));
    let orchestrator = BulkOrchestrator::new(
        fetcher,
        Arc::new(ProgressBroadcaster::new()),
        BulkConfig::default()
            .with_max_concurrent(4)
            .with_map_name("parcels")
            .with_initial_broadcast_delay(Duration::from_millis(5)),
    );

    Harness {
        cache,
        generator,
        orchestrator,
    }
}

fn request(task_id: &str, bounds: [f64; 4], minzoom: u32, maxzoom: u32) -> BulkRunRequest {
    BulkRunRequest {
        is_slice: true,
        task_id: task_id.to_string(),
        bounds: bounds.to_vec(),
        minzoom,
        maxzoom,
    }
}

/// Collect snapshots until the non-running one arrives.
async fn collect_until_done(rx: &mut mpsc::Receiver<ProgressSnapshot>) -> Vec<ProgressSnapshot> {
    let mut seen = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(snapshot) = rx.recv().await {
            let done = !snapshot.is_running;
            seen.push(snapshot);
            if done {
                break;
            }
        }
    })
    .await
    .expect("final snapshot never arrived");
    seen
}

// ============================================================================
// Integration Tests
// ============================================================================

/// Every tile of the plan ends up in the cache under the task-scoped key.
#[tokio::test]
async fn test_run_warms_every_tile() {
    let h = harness();
    let plan = request("warm1", [-0.1, -0.1, 0.1, 0.1], 9, 10)
        .validate()
        .unwrap();
    let expected = plan.total_tiles();
    assert!(expected > 0);

    let handle = h.orchestrator.start(&plan);
    let task = handle.task().clone();
    let summary = handle.wait().await.unwrap();

    assert_eq!(summary.total, expected);
    assert_eq!(summary.completed, expected);
    assert_eq!(summary.failed, 0);
    assert!(!summary.cancelled);
    assert_eq!(h.generator.calls.load(Ordering::SeqCst) as u64, expected);

    for tile in task.tiles() {
        let key = TileKey::new("parcels", tile.zoom, tile.x, tile.y).with_query("task_id=warm1");
        assert!(
            h.cache.get(&key).await.unwrap().is_some(),
            "tile {:?} was not cached",
            tile
        );
    }
}

/// A second run of the same area is served entirely from the cache.
#[tokio::test]
async fn test_second_run_hits_cache() {
    let h = harness();
    let plan = request("warm2", [10.0, 50.0, 10.2, 50.2], 8, 8)
        .validate()
        .unwrap();

    h.orchestrator.start(&plan).wait().await.unwrap();
    let first_calls = h.generator.calls.load(Ordering::SeqCst);

    let summary = h.orchestrator.start(&plan).wait().await.unwrap();
    assert_eq!(summary.failed, 0);
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), first_calls);
}

/// Subscribers see monotonic progress ending in a single 100% snapshot.
#[tokio::test]
async fn test_subscriber_sees_final_snapshot() {
    let h = harness();
    let plan = request("watched", [-1.0, -1.0, 1.0, 1.0], 6, 8)
        .validate()
        .unwrap();
    let total = plan.total_tiles();

    let mut subscription = h.orchestrator.broadcaster().subscribe("watched");
    let handle = h.orchestrator.start(&plan);
    let snapshots = collect_until_done(&mut subscription.receiver).await;
    handle.wait().await.unwrap();

    let last = snapshots.last().unwrap();
    assert_eq!(last.task_id, "watched");
    assert_eq!(last.completed, total);
    assert_eq!(last.total, total);
    assert_eq!(last.percentage, 100.0);
    assert!(!last.is_running);

    for pair in snapshots.windows(2) {
        assert!(pair[0].completed <= pair[1].completed);
    }
    assert_eq!(snapshots.iter().filter(|s| !s.is_running).count(), 1);
}

/// Two concurrent runs keep their progress streams apart.
#[tokio::test]
async fn test_concurrent_runs_are_isolated() {
    let h = harness();
    let a = request("run-a", [0.0, 0.0, 0.5, 0.5], 8, 8).validate().unwrap();
    let b = request("run-b", [20.0, 20.0, 20.5, 20.5], 9, 9)
        .validate()
        .unwrap();

    let mut sub_a = h.orchestrator.broadcaster().subscribe("run-a");
    let mut sub_b = h.orchestrator.broadcaster().subscribe("run-b");

    let handle_a = h.orchestrator.start(&a);
    let handle_b = h.orchestrator.start(&b);

    let seen_a = collect_until_done(&mut sub_a.receiver).await;
    let seen_b = collect_until_done(&mut sub_b.receiver).await;
    handle_a.wait().await.unwrap();
    handle_b.wait().await.unwrap();

    assert!(seen_a.iter().all(|s| s.task_id == "run-a"));
    assert!(seen_b.iter().all(|s| s.task_id == "run-b"));
    assert_eq!(seen_a.last().unwrap().total, a.total_tiles());
    assert_eq!(seen_b.last().unwrap().total, b.total_tiles());

    // Task-scoped keys mean neither run reused the other's tiles.
    assert_eq!(
        h.generator.calls.load(Ordering::SeqCst) as u64,
        a.total_tiles() + b.total_tiles()
    );
}

/// Finished runs leave the registry; their progress reads as not running.
#[tokio::test]
async fn test_finished_run_leaves_registry() {
    let h = harness();
    let plan = request("gone", [5.0, 5.0, 5.1, 5.1], 7, 7).validate().unwrap();

    h.orchestrator.start(&plan).wait().await.unwrap();

    assert!(h.orchestrator.registry().get("gone").is_none());
    let snapshot = h.orchestrator.progress("gone");
    assert!(!snapshot.is_running);
    assert_eq!(snapshot.total, 0);
}

/// Cancelling mid-run stops new work and ends the run as cancelled.
#[tokio::test]
async fn test_cancel_mid_run() {
    let h = harness();
    let plan = request("big", [-10.0, -10.0, 10.0, 10.0], 10, 10)
        .validate()
        .unwrap();
    let total = plan.total_tiles();

    let handle = h.orchestrator.start(&plan);
    tokio::time::timeout(Duration::from_secs(5), async {
        while h.generator.calls.load(Ordering::SeqCst) < 8 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();

    assert!(h.orchestrator.cancel("big"));
    let summary = handle.wait().await.unwrap();

    assert!(summary.cancelled);
    assert!(summary.completed < total);
    assert!((h.generator.calls.load(Ordering::SeqCst) as u64) < total);
}
