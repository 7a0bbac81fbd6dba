//! Application bootstrap.
//!
//! Builds the components in dependency order: cache backend, tile
//! generator, middleware, progress broadcaster, bulk orchestrator. Every
//! registry is created here and handed down; nothing is global.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::error::AppError;
use crate::bulk::{
    BulkOrchestrator, HttpTileFetcher, MiddlewareTileFetcher, ProgressBroadcaster, TileFetcher,
};
use crate::cache::{build_cache, TileCacheMiddleware};
use crate::config::{ConfigFile, FetchMode, GeneratorKind};
use crate::http::{self, AppState};
use crate::tile::{PostgisTileGenerator, TileGenerator, UpstreamTileGenerator};

/// A fully wired tile cache server.
pub struct TileCacheApp {
    config: ConfigFile,
    state: AppState,
}

impl TileCacheApp {
    /// Start every component described by `config`.
    ///
    /// # Errors
    ///
    /// - `AppError::CacheStart` if the selected cache backend is unreachable
    /// - `AppError::Config` if the generator's required settings are missing
    /// - `AppError::Database` if the PostGIS pool cannot connect
    pub async fn start(config: ConfigFile) -> Result<Self, AppError> {
        let generator = build_generator(&config).await?;
        Self::start_with_generator(config, generator).await
    }

    /// Start with a caller-supplied generator instead of the configured one.
    pub async fn start_with_generator(
        config: ConfigFile,
        generator: Arc<dyn TileGenerator>,
    ) -> Result<Self, AppError> {
        let cache = build_cache(&config.cache_backend()).await?;
        let middleware = Arc::new(
            TileCacheMiddleware::new(cache)
                .with_cacheable_params(config.cache.cacheable_params.clone()),
        );

        let bulk_config = config.bulk_config();
        let fetcher: Arc<dyn TileFetcher> = match config.bulk.fetch_mode {
            FetchMode::Local => Arc::new(MiddlewareTileFetcher::new(
                middleware.clone(),
                generator.clone(),
            )),
            FetchMode::Http => Arc::new(HttpTileFetcher::new(
                &config.bulk.base_url,
                bulk_config.tile_timeout,
            )?),
        };

        let broadcaster = Arc::new(ProgressBroadcaster::new());
        let orchestrator = BulkOrchestrator::new(fetcher, broadcaster, bulk_config);

        info!(
            cache = %config.cache.backend,
            generator = %config.server.generator,
            fetch_mode = %config.bulk.fetch_mode,
            bulk_map = %config.bulk.map,
            "Tile cache started"
        );

        Ok(Self {
            state: AppState::new(middleware, generator, orchestrator),
            config,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Shared handler state (middleware, generator, orchestrator).
    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn orchestrator(&self) -> &BulkOrchestrator {
        &self.state.orchestrator
    }

    /// Bind `[server] bind` and serve until `shutdown` is cancelled.
    pub async fn serve(&self, shutdown: CancellationToken) -> Result<(), AppError> {
        let listener = TcpListener::bind(&self.config.server.bind).await?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener.
    pub async fn serve_on(
        &self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), AppError> {
        http::serve(listener, self.state.clone(), shutdown).await?;
        Ok(())
    }
}

async fn build_generator(config: &ConfigFile) -> Result<Arc<dyn TileGenerator>, AppError> {
    match config.server.generator {
        GeneratorKind::Upstream => {
            let url = config.server.upstream_url.as_deref().ok_or_else(|| {
                AppError::Config(
                    "[server] upstream_url is required when generator = upstream".to_string(),
                )
            })?;
            let generator = UpstreamTileGenerator::with_timeout(url, config.upstream_timeout())?;
            info!(upstream = %url, "Proxying tiles from upstream server");
            Ok(Arc::new(generator))
        }
        GeneratorKind::Postgis => {
            let url = config.postgis.url.as_deref().ok_or_else(|| {
                AppError::Config("[postgis] url is required when generator = postgis".to_string())
            })?;
            let maps = config.map_definitions()?;
            if maps.is_empty() {
                warn!("No [map.*] sections configured, every tile request will be rejected");
            }

            let pool = PgPoolOptions::new()
                .max_connections(config.postgis.max_connections)
                .connect(url)
                .await?;

            let generator = PostgisTileGenerator::new(pool, maps)
                .with_geometry_field(config.postgis.geometry_field.clone());
            info!(
                maps = ?generator.map_names().collect::<Vec<_>>(),
                "Rendering tiles from PostGIS"
            );
            Ok(Arc::new(generator))
        }
    }
}
