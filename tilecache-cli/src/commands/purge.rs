//! Purge command - remove one tile from the configured cache.

use std::path::PathBuf;

use tilecache::cache::{build_cache, TileKey};

use super::common::{load_config, runtime};
use crate::error::CliError;

/// Arguments for the purge command.
pub struct PurgeArgs {
    pub config_path: Option<PathBuf>,
    pub path: String,
    pub query: Option<String>,
}

/// Run the purge command.
pub fn run(args: PurgeArgs) -> Result<(), CliError> {
    let config = load_config(args.config_path.as_deref())?;
    let key = purge_key(&args.path, args.query.as_deref())?;

    let rt = runtime()?;
    rt.block_on(async move {
        let cache = build_cache(&config.cache_backend())
            .await?
            .ok_or_else(|| CliError::Config("no cache backend configured".to_string()))?;

        cache.purge(&key).await?;
        println!("Purged {} from {} cache", key, cache.name());
        Ok::<(), CliError>(())
    })
}

/// Cache key for a tile path and optional raw query.
fn purge_key(path: &str, query: Option<&str>) -> Result<TileKey, CliError> {
    let key = TileKey::parse_path(path)?;
    Ok(match query.map(|q| q.trim_start_matches('?')) {
        Some(query) => key.with_query(query),
        None => key,
    })
}
