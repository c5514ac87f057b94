//! Sluice service entry point.
//!
//! `sluice run` ingests a record feed into hourly batches and archives
//! them; `sluice search` answers keyword-frequency queries over hours
//! already archived.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sluice_ingest::config::{Config, FeedConfig};
use sluice_processor::store::FsStore;
use sluice_shared::types::bucket::TimeBucket;

#[derive(Parser, Debug)]
#[command(name = "sluice")]
#[command(about = "Streaming feed ingestion with hourly batching and spike detection", long_about = None)]
#[command(version)]
struct Args {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest the feed until it ends or a shutdown signal arrives
    Run(RunArgs),
    /// Count a keyword per archived hour
    Search(SearchArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Feed file in JSON-lines form ("-" reads stdin)
    #[arg(short, long, default_value = "-")]
    feed: String,

    /// Directory for open and unarchived batches
    #[arg(long, default_value = "data", env = "SLUICE_DATA_DIR")]
    data_dir: PathBuf,

    /// Directory batches are archived into
    #[arg(long, default_value = "archive", env = "SLUICE_ARCHIVE_DIR")]
    archive_dir: PathBuf,

    /// Status snapshot file, rewritten every tick
    #[arg(long, default_value = "status.json", env = "SLUICE_STATUS_FILE")]
    status_file: PathBuf,

    /// Rate-sampling tick (e.g., "1s", "5s")
    #[arg(long, default_value = "1s")]
    tick: String,

    /// Batch handoff queue capacity
    #[arg(long, default_value = "8")]
    queue_capacity: usize,

    /// EMA warmup length in ticks
    #[arg(long, default_value = "20")]
    ema_length: usize,

    /// Growth comparison distance in ticks
    #[arg(long, default_value = "5")]
    growth_length: usize,

    /// Growth ratio at or above which a spike is reported
    #[arg(long, default_value = "1.3")]
    spike_threshold: f64,

    /// Seconds of records sampled after each spike
    #[arg(long, default_value = "30")]
    sample_window: i64,

    /// Tokens kept per spike
    #[arg(long, default_value = "5")]
    top_k: usize,
}

#[derive(Parser, Debug)]
struct SearchArgs {
    /// Directory batches were archived into
    #[arg(long, default_value = "archive", env = "SLUICE_ARCHIVE_DIR")]
    archive_dir: PathBuf,

    /// Keyword to count
    keyword: String,

    /// First hour, as YYYY-MM-DD_HH
    #[arg(long)]
    from: TimeBucket,

    /// Last hour (inclusive), as YYYY-MM-DD_HH
    #[arg(long)]
    to: TimeBucket,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose)?;

    match args.command {
        Command::Run(run_args) => run(run_args).await,
        Command::Search(search_args) => search(search_args).await,
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    Ok(())
}

async fn run(args: RunArgs) -> Result<()> {
    let tick_interval =
        sluice_shared::utils::parse_duration(&args.tick).context("parsing --tick")?;

    let mut config = Config {
        feed: if args.feed == "-" {
            FeedConfig::Stdin
        } else {
            FeedConfig::File(PathBuf::from(args.feed))
        },
        data_dir: args.data_dir,
        store: sluice_processor::StoreConfig::Fs {
            root: args.archive_dir,
        },
        status_path: args.status_file,
        tick_interval,
        queue_capacity: args.queue_capacity,
        ..Config::default()
    };
    config.processor.spike.ema_length = args.ema_length;
    config.processor.spike.growth_length = args.growth_length;
    config.processor.spike.spike_threshold = args.spike_threshold;
    config.processor.sample_window_secs = args.sample_window;
    config.processor.top_k = args.top_k;

    info!("Starting sluice ingestion service");
    sluice_ingest::run(config).await
}

async fn search(args: SearchArgs) -> Result<()> {
    anyhow::ensure!(args.from <= args.to, "--from must not be after --to");

    let store = FsStore::new(args.archive_dir);
    let hits = sluice_processor::search::search(&store, &args.keyword, args.from, args.to)
        .await
        .context("searching archive")?;

    if hits.is_empty() {
        println!("no archived hours in range");
        return Ok(());
    }
    for (bucket, count) in hits {
        println!("{bucket}\t{count}");
    }
    Ok(())
}
