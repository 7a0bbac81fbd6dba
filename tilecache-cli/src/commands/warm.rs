//! Warm command - run one bulk run to completion with a progress bar.
//!
//! Progress comes from a broadcaster subscription, the same stream the
//! WebSocket clients see, so the bar advances in throttled steps.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use tilecache::app::{AppError, TileCacheApp};
use tilecache::bulk::{
    BulkOrchestrator, BulkRunPlan, BulkRunRequest, BulkRunSummary, HttpTileFetcher,
    ProgressBroadcaster,
};
use tilecache::config::{CacheBackendKind, ConfigFile, FetchMode};

use super::common::{cancel_on_ctrl_c, load_config, parse_bounds, runtime, start_logging};
use crate::error::CliError;

/// Arguments for the warm command.
pub struct WarmArgs {
    pub config_path: Option<PathBuf>,
    pub task_id: String,
    pub bounds: String,
    pub minzoom: u32,
    pub maxzoom: u32,
    pub base_url: Option<String>,
    pub concurrency: Option<usize>,
}

/// Run the warm command.
pub fn run(args: WarmArgs) -> Result<(), CliError> {
    let mut config = load_config(args.config_path.as_deref())?;
    if let Some(base_url) = args.base_url {
        config.bulk.fetch_mode = FetchMode::Http;
        config.bulk.base_url = base_url;
    }
    if let Some(concurrency) = args.concurrency {
        config.bulk.max_concurrent = concurrency.max(1);
    }

    let plan = BulkRunRequest {
        is_slice: true,
        task_id: args.task_id,
        bounds: parse_bounds(&args.bounds)?,
        minzoom: args.minzoom,
        maxzoom: args.maxzoom,
    }
    .validate()?;

    let _logging = start_logging(&config)?;

    println!(
        "Warming {} tiles for task '{}' (zoom {}..={}, {} at once)",
        plan.total_tiles(),
        plan.task_id,
        args.minzoom.min(args.maxzoom),
        args.minzoom.max(args.maxzoom),
        config.bulk.max_concurrent
    );
    match config.bulk.fetch_mode {
        FetchMode::Http => println!("Target: {}", config.bulk.base_url),
        FetchMode::Local => {
            println!("Target: in-process ({} cache)", config.cache.backend);
            if config.cache.backend != CacheBackendKind::Redis {
                warn!("Warming a non-shared cache in-process; the tiles are discarded on exit");
            }
        }
    }
    println!();

    let rt = runtime()?;
    let summary = rt.block_on(async move {
        let orchestrator = build_orchestrator(config).await?;
        Ok::<_, CliError>(warm(&orchestrator, &plan).await?)
    })?;

    print_summary(&summary);
    Ok(())
}

/// The orchestrator for the configured fetch mode.
async fn build_orchestrator(config: ConfigFile) -> Result<BulkOrchestrator, CliError> {
    match config.bulk.fetch_mode {
        FetchMode::Http => {
            let bulk = config.bulk_config();
            let fetcher = HttpTileFetcher::new(&config.bulk.base_url, bulk.tile_timeout)
                .map_err(AppError::Generator)?;
            Ok(BulkOrchestrator::new(
                Arc::new(fetcher),
                Arc::new(ProgressBroadcaster::new()),
                bulk,
            ))
        }
        FetchMode::Local => {
            let app = TileCacheApp::start(config).await?;
            Ok(app.orchestrator().clone())
        }
    }
}

/// Run `plan`, drawing progress until the final snapshot arrives.
async fn warm(
    orchestrator: &BulkOrchestrator,
    plan: &BulkRunPlan,
) -> Result<BulkRunSummary, CliError> {
    let mut subscription = orchestrator.broadcaster().subscribe(&plan.task_id);
    let bar = progress_bar(plan.total_tiles());

    let handle = orchestrator.start(plan);
    let task = handle.task().clone();

    let interrupt = CancellationToken::new();
    cancel_on_ctrl_c(interrupt.clone());

    loop {
        tokio::select! {
            snapshot = subscription.receiver.recv() => {
                match snapshot {
                    Some(snapshot) => {
                        bar.set_position(snapshot.completed);
                        if !snapshot.is_running {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = interrupt.cancelled(), if !task.is_cancelled() => {
                bar.set_message("cancelling, waiting for in-flight tiles");
                task.cancel();
            }
        }
    }

    orchestrator.broadcaster().unsubscribe(subscription.id);
    let summary = handle.wait().await?;
    bar.set_position(summary.completed);
    bar.finish_and_clear();
    Ok(summary)
}

fn progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> "),
    );
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

fn print_summary(summary: &BulkRunSummary) {
    let outcome = if summary.cancelled {
        style("cancelled").yellow()
    } else if summary.failed > 0 {
        style("finished with failures").yellow()
    } else {
        style("done").green()
    };

    println!("Task '{}' {}", summary.task_id, outcome);
    println!("  Tiles:     {}/{}", summary.completed, summary.total);
    println!("  Succeeded: {}", summary.succeeded());
    println!("  Failed:    {}", summary.failed);
    println!("  Elapsed:   {:.1}s", summary.elapsed.as_secs_f64());
}
