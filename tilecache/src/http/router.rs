//! Route table.

use axum::http::Uri;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::error::ApiError;
use super::state::AppState;
use super::{bulk, progress, status, tiles};

/// Build the application router.
///
/// ```text
/// GET  /maps/:map/:z/:x/:tile          tile through the cache
/// POST /api/sliceTiles                 start or stop a bulk run
/// GET  /api/progress                   WebSocket progress channel
/// GET  /api/tasks/:task_id/progress    progress snapshot
/// GET  /api/v1/status                  liveness, version, active runs
/// ```
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/sliceTiles", post(bulk::slice_tiles))
        .route("/progress", get(progress::progress_socket))
        .route("/tasks/:task_id/progress", get(bulk::task_progress))
        .route("/v1/status", get(status::status));

    Router::new()
        .route("/maps/:map/:z/:x/:tile", get(tiles::get_tile))
        .nest("/api", api)
        .fallback(not_found)
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("not found: {}", uri.path()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::bulk::{
        BulkConfig, BulkOrchestrator, BulkRunPlan, MiddlewareTileFetcher, ProgressBroadcaster,
        ProgressSnapshot, TileTask,
    };
    use crate::cache::{
        BoxFuture, MemoryCacheConfig, MemoryTileCache, TileCache, TileCacheMiddleware,
    };
    use crate::coord::Bounds;
    use crate::http::error::ApiMessage;
    use crate::http::status::StatusResponse;
    use crate::tile::{TileError, TileGenerator, TileRequest, TileResponse, MVT_CONTENT_TYPE};

    /// Generator that answers with the request path and counts calls.
    #[derive(Default)]
    struct PathGenerator {
        calls: AtomicUsize,
    }

    impl TileGenerator for PathGenerator {
        fn generate<'a>(
            &'a self,
            request: &'a TileRequest,
        ) -> BoxFuture<'a, Result<TileResponse, TileError>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if request.path().starts_with("/missing/") {
                    return Err(TileError::UnknownMap("missing".to_string()));
                }
                Ok(TileResponse::ok(
                    request.path().as_bytes().to_vec(),
                    MVT_CONTENT_TYPE,
                ))
            })
        }
    }

    fn test_state() -> (AppState, Arc<PathGenerator>) {
        let cache: Arc<dyn TileCache> =
            Arc::new(MemoryTileCache::new(&MemoryCacheConfig::default()));
        let middleware = Arc::new(TileCacheMiddleware::new(Some(cache)));
        let generator = Arc::new(PathGenerator::default());
        let fetcher = Arc::new(MiddlewareTileFetcher::new(
            middleware.clone(),
            generator.clone(),
        ));
        let orchestrator = BulkOrchestrator::new(
            fetcher,
            Arc::new(ProgressBroadcaster::new()),
            BulkConfig::default().with_initial_broadcast_delay(Duration::from_millis(5)),
        );
        (AppState::new(middleware, generator.clone(), orchestrator), generator)
    }

    fn test_app() -> (Router, Arc<PathGenerator>) {
        let (state, generator) = test_state();
        (build_router(state), generator)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_status() {
        let (app, _) = test_app();
        let response = app.oneshot(get("/api/v1/status")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let status: StatusResponse = body_json(response).await;
        assert_eq!(status.status, "running");
        assert_eq!(status.cache, "memory");
        assert!(status.active_tasks.is_empty());
    }

    #[tokio::test]
    async fn test_status_lists_registered_runs() {
        let (state, _) = test_state();
        let plan = BulkRunPlan::new("area_7", Bounds::new(-0.1, -0.1, 0.1, 0.1), vec![10]);
        let before = chrono::Utc::now();
        state
            .orchestrator
            .registry()
            .register(Arc::new(TileTask::new(&plan)));

        let response = build_router(state)
            .oneshot(get("/api/v1/status"))
            .await
            .unwrap();
        let status: StatusResponse = body_json(response).await;

        assert_eq!(status.active_tasks.len(), 1);
        let task = &status.active_tasks[0];
        assert_eq!(task.task_id, "area_7");
        assert_eq!(task.bounds, Some([-0.1, -0.1, 0.1, 0.1]));
        assert_eq!(task.zoom_levels, vec![10]);
        assert_eq!((task.completed, task.failed, task.total), (0, 0, 4));
        assert!(task.started_at >= before);
    }

    #[tokio::test]
    async fn test_tile_miss_then_hit() {
        let (app, generator) = test_app();

        let first = app
            .clone()
            .oneshot(get("/maps/osm/3/4/2.pbf"))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()["tile-cache"], "MISS");
        assert_eq!(first.headers()["content-type"], MVT_CONTENT_TYPE);
        let body = to_bytes(first.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"/osm/3/4/2.pbf");

        let second = app.oneshot(get("/maps/osm/3/4/2.pbf")).await.unwrap();
        assert_eq!(second.headers()["tile-cache"], "HIT");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_task_scoped_tiles_cached_separately() {
        let (app, generator) = test_app();

        for uri in [
            "/maps/osm/3/4/2.pbf?task_id=a",
            "/maps/osm/3/4/2.pbf?task_id=b",
            "/maps/osm/3/4/2.pbf?task_id=a",
        ] {
            let response = app.clone().oneshot(get(uri)).await.unwrap();
            to_bytes(response.into_body(), usize::MAX).await.unwrap();
        }

        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unlisted_query_bypasses_cache() {
        let (app, _) = test_app();
        let response = app.oneshot(get("/maps/osm/3/4/2.pbf?foo=1")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("tile-cache").is_none());
    }

    #[tokio::test]
    async fn test_generator_error_maps_to_status() {
        let (app, _) = test_app();
        let response = app.oneshot(get("/maps/missing/1/0/0.pbf")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_slice_tiles_rejects_bad_bounds() {
        let (app, _) = test_app();
        let response = app
            .oneshot(post_json(
                "/api/sliceTiles",
                r#"{"isSlice":true,"task_id":"t","bounds":[1,2,3],"minzoom":1,"maxzoom":1}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let message: ApiMessage = body_json(response).await;
        assert_eq!(message.code, 400);
    }

    #[tokio::test]
    async fn test_slice_tiles_rejects_malformed_json() {
        let (app, _) = test_app();
        let response = app
            .oneshot(post_json("/api/sliceTiles", "{not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let message: ApiMessage = body_json(response).await;
        assert_eq!(message.code, 400);
    }

    #[tokio::test]
    async fn test_slice_tiles_starts_run() {
        let (app, generator) = test_app();
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/sliceTiles",
                r#"{"isSlice":true,"task_id":"run1","bounds":[-0.1,-0.1,0.1,0.1],"minzoom":10,"maxzoom":10}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let message: ApiMessage = body_json(response).await;
        assert_eq!(message.code, 200);
        assert_eq!(message.is_slice, Some(true));

        // The run registers before the handler returns.
        let progress = app
            .clone()
            .oneshot(get("/api/tasks/run1/progress"))
            .await
            .unwrap();
        let snapshot: ProgressSnapshot = body_json(progress).await;
        assert_eq!(snapshot.task_id, "run1");

        tokio::time::timeout(Duration::from_secs(5), async {
            while generator.calls.load(Ordering::SeqCst) < 4 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_slice_tiles_stop() {
        let (app, _) = test_app();
        let response = app
            .oneshot(post_json(
                "/api/sliceTiles",
                r#"{"isSlice":false,"task_id":"run1","bounds":[1,2,3,4],"minzoom":1,"maxzoom":1}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let message: ApiMessage = body_json(response).await;
        assert_eq!(message.is_slice, Some(false));
    }

    #[tokio::test]
    async fn test_unknown_task_progress() {
        let (app, _) = test_app();
        let response = app.oneshot(get("/api/tasks/nope/progress")).await.unwrap();
        let snapshot: ProgressSnapshot = body_json(response).await;
        assert!(!snapshot.is_running);
        assert_eq!(snapshot.total, 0);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (app, _) = test_app();
        let response = app.oneshot(get("/nowhere")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
