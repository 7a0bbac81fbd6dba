//! tilecache CLI - serve, warm and purge cached vector tiles.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::purge::PurgeArgs;
use commands::serve::ServeArgs;
use commands::warm::WarmArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "tilecache")]
#[command(version, about = "Vector tile cache with bulk cache warming", long_about = None)]
struct Cli {
    /// Config file (default: ~/.tilecache/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tile server
    Serve {
        /// Listen address, overrides [server] bind
        #[arg(long)]
        bind: Option<String>,
    },

    /// Warm the cache for a bounding box across a zoom range
    Warm {
        /// Task id scoping the warmed tiles
        #[arg(long)]
        task_id: String,

        /// min_lng,min_lat,max_lng,max_lat
        #[arg(long, allow_hyphen_values = true)]
        bounds: String,

        #[arg(long)]
        minzoom: u32,

        #[arg(long)]
        maxzoom: u32,

        /// Warm a running server over HTTP instead of in-process
        #[arg(long)]
        base_url: Option<String>,

        /// Tiles fetched at once, overrides [bulk] max_concurrent
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Remove one cached tile
    Purge {
        /// Tile path, e.g. /parcels/12/2048/1361.pbf
        #[arg(long)]
        path: String,

        /// Raw query the tile was cached with, e.g. task_id=run1
        #[arg(long)]
        query: Option<String>,
    },

    /// Inspect the configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config;

    match cli.command {
        Commands::Serve { bind } => commands::serve::run(ServeArgs { config_path, bind }),
        Commands::Warm {
            task_id,
            bounds,
            minzoom,
            maxzoom,
            base_url,
            concurrency,
        } => commands::warm::run(WarmArgs {
            config_path,
            task_id,
            bounds,
            minzoom,
            maxzoom,
            base_url,
            concurrency,
        }),
        Commands::Purge { path, query } => commands::purge::run(PurgeArgs {
            config_path,
            path,
            query,
        }),
        Commands::Config(command) => commands::config::run(command, config_path),
    }
}
