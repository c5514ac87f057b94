//! Batch worker: drains the handoff queue, derives per-hour artifacts,
//! archives everything to the object store, and reclaims local disk.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use sluice_shared::service::Service;
use sluice_shared::types::batch::{SealedBatch, RATE_LOG, RECORDS_LOG};
use sluice_shared::types::record::{RateSample, Record, SpikeEvent};

use crate::contents::{find_spike_contents, token_frequencies};
use crate::handoff::BatchReceiver;
use crate::spike::{SpikeDetector, SpikeParams};
use crate::store::ObjectStore;
use crate::tokenize::Tokenizer;

/// EMA series derived from the rate log.
pub const EMA_SERIES: &str = "ema.json";

/// Growth-ratio series derived from the rate log.
pub const GROWTH_SERIES: &str = "growth.json";

/// Spike events with sampled contents.
pub const SPIKES_FILE: &str = "spikes.json";

/// Per-hour token frequency dictionary, consumed by keyword search.
pub const TOKENS_INDEX: &str = "tokens.json";

#[derive(Debug, Clone)]
pub struct ProcessorParams {
    pub spike: SpikeParams,
    /// Seconds of records sampled after each spike tick.
    pub sample_window_secs: i64,
    /// Tokens kept per spike.
    pub top_k: usize,
}

impl Default for ProcessorParams {
    fn default() -> Self {
        Self {
            spike: SpikeParams::default(),
            sample_window_secs: 30,
            top_k: 5,
        }
    }
}

/// Consumes sealed batches and turns each into archived artifacts.
///
/// A failure while processing one batch is logged and leaves that batch's
/// directory on disk; the worker moves on to the next batch rather than
/// taking the whole service down.
pub struct Processor {
    params: ProcessorParams,
    tokenizer: Arc<dyn Tokenizer>,
    store: Arc<dyn ObjectStore>,
    rx: BatchReceiver,
}

impl Processor {
    pub fn new(
        params: ProcessorParams,
        tokenizer: Arc<dyn Tokenizer>,
        store: Arc<dyn ObjectStore>,
        rx: BatchReceiver,
    ) -> Self {
        Self {
            params,
            tokenizer,
            store,
            rx,
        }
    }

    /// Process a single sealed batch end to end.
    ///
    /// The rate log is replayed through a fresh detector, so the derived
    /// series depend only on the batch contents and reprocessing a batch
    /// yields identical artifacts. The local directory is removed only
    /// after every upload succeeds; on failure it stays behind for
    /// recovery.
    pub async fn process(&self, batch: &SealedBatch) -> Result<()> {
        let records = read_records(batch).await?;
        let samples = read_rate_log(batch).await?;

        let mut detector = SpikeDetector::new(self.params.spike.clone());
        let mut spikes: Vec<SpikeEvent> = Vec::new();
        for sample in &samples {
            if let Some(mut event) = detector.ingest_tick(sample.ts, sample.count) {
                event.top_tokens = find_spike_contents(
                    &records,
                    event.ts,
                    self.params.sample_window_secs,
                    self.params.top_k,
                    self.tokenizer.as_ref(),
                );
                spikes.push(event);
            }
        }

        // BTreeMap keeps the dictionary stable across runs.
        let tokens: BTreeMap<String, u64> = token_frequencies(&records, self.tokenizer.as_ref())
            .into_iter()
            .collect();

        write_artifact(batch, EMA_SERIES, detector.ema_series()).await?;
        write_artifact(batch, GROWTH_SERIES, detector.growth_series()).await?;
        write_artifact(batch, SPIKES_FILE, &spikes).await?;
        write_artifact(batch, TOKENS_INDEX, &tokens).await?;

        let prefix = batch.bucket.to_string();
        for name in [
            RECORDS_LOG,
            RATE_LOG,
            EMA_SERIES,
            GROWTH_SERIES,
            SPIKES_FILE,
            TOKENS_INDEX,
        ] {
            self.upload_file(&prefix, name, batch).await?;
        }

        tokio::fs::remove_dir_all(&batch.dir)
            .await
            .with_context(|| format!("removing archived batch dir {}", batch.dir.display()))?;

        info!(
            bucket = %batch.bucket,
            records = batch.record_count,
            spikes = spikes.len(),
            tokens = tokens.len(),
            "batch archived"
        );
        Ok(())
    }

    async fn upload_file(&self, prefix: &str, name: &str, batch: &SealedBatch) -> Result<()> {
        let path = batch.dir.join(name);
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        self.store
            .put(&format!("{prefix}/{name}"), bytes)
            .await
            .with_context(|| format!("uploading {prefix}/{name}"))
    }
}

/// Derived artifacts land next to the logs before upload, so a failed
/// upload leaves a complete batch directory behind.
async fn write_artifact<T: serde::Serialize + ?Sized>(
    batch: &SealedBatch,
    name: &str,
    value: &T,
) -> Result<()> {
    let bytes = serde_json::to_vec(value).with_context(|| format!("encoding {name}"))?;
    let path = batch.dir.join(name);
    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

#[async_trait]
impl Service for Processor {
    fn name(&self) -> &'static str {
        "processor"
    }

    /// Runs until the handoff queue closes and drains. The token is not
    /// watched: on shutdown the producer side drops its sender, and every
    /// batch already queued is still processed before the worker exits.
    async fn run(mut self: Box<Self>, _shutdown: CancellationToken) -> Result<()> {
        while let Some(batch) = self.rx.pop().await {
            debug!(bucket = %batch.bucket, "batch received");
            if let Err(e) = self.process(&batch).await {
                error!(bucket = %batch.bucket, error = %format!("{e:#}"), "batch processing failed");
            }
        }
        info!("handoff queue drained, processor stopping");
        Ok(())
    }
}

async fn read_records(batch: &SealedBatch) -> Result<Vec<Record>> {
    let path = batch.dir.join(RECORDS_LOG);
    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    parse_lines(&raw).with_context(|| format!("parsing {}", path.display()))
}

async fn read_rate_log(batch: &SealedBatch) -> Result<Vec<RateSample>> {
    let path = batch.dir.join(RATE_LOG);
    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    parse_lines(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn parse_lines<T: serde::de::DeserializeOwned>(raw: &str) -> Result<Vec<T>> {
    raw.lines()
        .filter(|l| !l.trim().is_empty())
        .enumerate()
        .map(|(n, line)| serde_json::from_str(line).with_context(|| format!("line {}", n + 1)))
        .collect()
}
