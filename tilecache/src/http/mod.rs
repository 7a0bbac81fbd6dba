//! HTTP surface (axum).
//!
//! The tile endpoint runs every request through the cache middleware; the
//! `/api` routes drive bulk runs and report their progress. See
//! [`build_router`] for the route table.

mod bulk;
mod error;
mod progress;
mod router;
mod state;
mod status;
mod tiles;

pub use error::{ApiError, ApiMessage};
pub use progress::ClientEvent;
pub use router::build_router;
pub use state::{AppState, SERVER_VERSION};
pub use status::{ActiveTask, StatusResponse};
pub use tiles::{into_http_response, CACHE_STATUS_HEADER};

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Serve `state` on `listener` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "HTTP server listening");
    }

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("HTTP server stopped");
    Ok(())
}
