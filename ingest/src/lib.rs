//! Ingestion side of Sluice.
//!
//! Reads an unbounded record feed, appends records into hourly batches,
//! samples the arrival rate once per tick for live spike detection, and
//! hands sealed batches to the processor through a bounded queue.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use sluice_processor::handoff::{self, BatchSender};
use sluice_processor::store::open_store;
use sluice_processor::tokenize::{BasicTokenizer, Tokenizer};
use sluice_processor::{Processor, SpikeDetector};
use sluice_shared::error::FeedError;
use sluice_shared::service::Service;
use sluice_shared::types::record::RateSample;
use sluice_shared::utils::time::epoch_secs;

pub mod batch;
pub mod config;
pub mod counter;
pub mod feed;
pub mod pipeline;
pub mod retry;
pub mod status;

use config::{Config, FeedConfig};
use counter::RollingCounter;
use feed::{FeedSource, JsonLinesFeed};
use pipeline::IngestionPipeline;
use retry::Backoff;
use status::StatusReporter;

/// Reads the feed and appends every record into the current batch.
///
/// Storage failures are fatal for this task: a record that cannot be
/// persisted cannot be recovered, and writing past a failed append risks
/// a corrupt batch. Feed disconnects are retried with backoff.
pub struct FeedTask {
    feed: Box<dyn FeedSource>,
    counter: Arc<RollingCounter>,
    pipeline: Arc<Mutex<IngestionPipeline>>,
    batches: BatchSender,
}

#[async_trait]
impl Service for FeedTask {
    fn name(&self) -> &'static str {
        "feed"
    }

    async fn run(mut self: Box<Self>, shutdown: CancellationToken) -> Result<()> {
        let mut backoff = Backoff::new(Duration::from_secs(1));
        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = self.feed.next_record() => next,
            };
            match next {
                Ok(Some(record)) => {
                    backoff.reset();
                    self.counter.record_arrival();
                    let sealed = self
                        .pipeline
                        .lock()
                        .await
                        .ingest(&record, epoch_secs())
                        .context("appending record")?;
                    if let Some(batch) = sealed {
                        self.batches.push(batch).await?;
                    }
                }
                Ok(None) | Err(FeedError::Exhausted) => {
                    info!("feed exhausted");
                    break;
                }
                Err(FeedError::Disconnected(reason)) => {
                    let delay = backoff.next_delay();
                    warn!(%reason, delay_secs = delay.as_secs(), "feed disconnected, retrying");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
        Ok(())
    }
}

/// Once per tick: drain the arrival counter, log the sample into the
/// current batch, publish it for status reporting, and feed the live
/// spike detector.
pub struct TickTask {
    interval: Duration,
    counter: Arc<RollingCounter>,
    pipeline: Arc<Mutex<IngestionPipeline>>,
    batches: BatchSender,
    detector: SpikeDetector,
    rate_tx: watch::Sender<RateSample>,
}

#[async_trait]
impl Service for TickTask {
    fn name(&self) -> &'static str {
        "tick"
    }

    async fn run(mut self: Box<Self>, shutdown: CancellationToken) -> Result<()> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first interval tick fires immediately; skip it so the first
        // sample covers a full tick.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let sample = RateSample {
                ts: epoch_secs(),
                count: self.counter.drain_tick(),
            };
            let sealed = self
                .pipeline
                .lock()
                .await
                .record_tick(&sample)
                .context("appending rate sample")?;
            if let Some(batch) = sealed {
                self.batches.push(batch).await?;
            }
            if let Some(spike) = self.detector.ingest_tick(sample.ts, sample.count) {
                warn!(ts = spike.ts, growth = spike.growth, "traffic spike detected");
            }
            // Only the latest sample matters to status; send errors just
            // mean nobody is watching.
            let _ = self.rate_tx.send(sample);
        }
        Ok(())
    }
}

/// A service that fails takes the whole pipeline down: its error is
/// logged, the shared token is cancelled so the siblings stop, and the
/// error is kept for the supervisor to return.
fn spawn_service(service: Box<dyn Service>, shutdown: CancellationToken) -> JoinHandle<Result<()>> {
    let name = service.name();
    tokio::spawn(async move {
        let result = service.run(shutdown.clone()).await;
        if let Err(e) = &result {
            error!(service = name, error = %format!("{e:#}"), "service failed");
            shutdown.cancel();
        }
        result.with_context(|| format!("{name} service failed"))
    })
}

async fn join(name: &str, handle: JoinHandle<Result<()>>) -> Result<()> {
    match handle.await {
        Ok(result) => result,
        Err(e) => Err(anyhow::anyhow!("{name} task panicked: {e}")),
    }
}

/// Run the whole service until the feed ends or a shutdown signal
/// arrives, then drain: seal the open batch, hand it off, and wait for
/// the processor to archive everything queued.
pub async fn run(config: Config) -> Result<()> {
    config.validate()?;

    let feed: Box<dyn FeedSource> = match &config.feed {
        FeedConfig::Stdin => Box::new(JsonLinesFeed::stdin()),
        FeedConfig::File(path) => Box::new(JsonLinesFeed::open(path).await?),
    };
    let store = open_store(&config.store);
    let tokenizer: Arc<dyn Tokenizer> = Arc::new(BasicTokenizer::default());

    let (batch_tx, batch_rx) = handoff::bounded(config.queue_capacity);
    let (rate_tx, rate_rx) = watch::channel(RateSample {
        ts: epoch_secs(),
        count: 0,
    });
    let pipeline = Arc::new(Mutex::new(IngestionPipeline::new(config.data_dir.clone())));
    let counter = Arc::new(RollingCounter::new());

    let shutdown = CancellationToken::new();
    let mut feed_handle = spawn_service(
        Box::new(FeedTask {
            feed,
            counter: counter.clone(),
            pipeline: pipeline.clone(),
            batches: batch_tx.clone(),
        }),
        shutdown.clone(),
    );
    let tick_handle = spawn_service(
        Box::new(TickTask {
            interval: config.tick_interval,
            counter: counter.clone(),
            pipeline: pipeline.clone(),
            batches: batch_tx.clone(),
            detector: SpikeDetector::new(config.processor.spike.clone()),
            rate_tx,
        }),
        shutdown.clone(),
    );
    let status_handle = spawn_service(
        Box::new(StatusReporter::new(
            config.tick_interval,
            config.status_path.clone(),
            counter,
            rate_rx,
            pipeline.clone(),
        )),
        shutdown.clone(),
    );
    let processor_handle = spawn_service(
        Box::new(Processor::new(
            config.processor.clone(),
            tokenizer,
            store,
            batch_rx,
        )),
        shutdown.clone(),
    );

    let mut feed_result = None;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("shutdown signal received"),
        res = &mut feed_handle => {
            feed_result = Some(match res {
                Ok(result) => result,
                Err(e) => Err(anyhow::anyhow!("feed task panicked: {e}")),
            });
            info!("feed finished");
        }
    }

    shutdown.cancel();
    let feed_result = match feed_result {
        Some(result) => result,
        None => join("feed", feed_handle).await,
    };
    let tick_result = join("tick", tick_handle).await;
    let status_result = join("status-reporter", status_handle).await;

    // Final seal: whatever is still open goes through the same handoff
    // path as an hourly rotation. Runs even after a producer failure so
    // already-persisted records still reach the archive.
    if let Some(batch) = pipeline.lock().await.close()? {
        batch_tx.push(batch).await?;
    }
    drop(batch_tx);
    let processor_result = join("processor", processor_handle).await;

    // A fatal service error means records may have been lost; the process
    // must exit nonzero, not pretend the run was clean.
    feed_result?;
    tick_result?;
    status_result?;
    processor_result?;

    info!("shutdown complete");
    Ok(())
}
