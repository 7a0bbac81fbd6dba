//! Serve command - run the tile server until Ctrl-C.

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::info;

use tilecache::app::TileCacheApp;

use super::common::{cancel_on_ctrl_c, load_config, runtime, start_logging};
use crate::error::CliError;

/// Arguments for the serve command.
pub struct ServeArgs {
    pub config_path: Option<PathBuf>,
    pub bind: Option<String>,
}

/// Run the serve command.
pub fn run(args: ServeArgs) -> Result<(), CliError> {
    let mut config = load_config(args.config_path.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    let _logging = start_logging(&config)?;

    println!("tilecache v{}", tilecache::VERSION);
    println!("================");
    println!();
    println!("Listening:  {}", config.server.bind);
    println!("Generator:  {}", config.server.generator);
    println!("Cache:      {}", config.cache.backend);
    println!("Bulk map:   {}", config.bulk.map);
    println!();
    println!("Press Ctrl-C to stop.");

    let rt = runtime()?;
    rt.block_on(async move {
        let app = TileCacheApp::start(config).await?;
        let shutdown = CancellationToken::new();
        cancel_on_ctrl_c(shutdown.clone());

        app.serve(shutdown).await?;
        info!("Server stopped");
        Ok::<(), CliError>(())
    })
}
