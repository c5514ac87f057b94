//! Periodic status reporting: one log line and one `status.json` rewrite
//! per interval.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use sluice_shared::service::Service;
use sluice_shared::types::record::RateSample;
use sluice_shared::types::status::StatusSnapshot;

use crate::counter::RollingCounter;
use crate::pipeline::IngestionPipeline;

pub struct StatusReporter {
    interval: Duration,
    status_path: PathBuf,
    started: Instant,
    counter: Arc<RollingCounter>,
    rate_rx: watch::Receiver<RateSample>,
    pipeline: Arc<Mutex<IngestionPipeline>>,
}

impl StatusReporter {
    pub fn new(
        interval: Duration,
        status_path: PathBuf,
        counter: Arc<RollingCounter>,
        rate_rx: watch::Receiver<RateSample>,
        pipeline: Arc<Mutex<IngestionPipeline>>,
    ) -> Self {
        Self {
            interval,
            status_path,
            started: Instant::now(),
            counter,
            rate_rx,
            pipeline,
        }
    }

    /// One consistent read of the ingestion counters.
    pub async fn snapshot(&self) -> StatusSnapshot {
        let current_bucket = self
            .pipeline
            .lock()
            .await
            .current_bucket()
            .map(|b| b.to_string())
            .unwrap_or_else(|| "none".to_string());
        StatusSnapshot {
            duration_seconds: self.started.elapsed().as_secs(),
            total_records: self.counter.total(),
            records_per_tick: self.rate_rx.borrow().count,
            current_bucket,
        }
    }

    /// Reporting must never take ingestion down, so a failed write is a
    /// warning and nothing more.
    async fn publish(&self, snapshot: &StatusSnapshot) {
        info!(
            uptime_secs = snapshot.duration_seconds,
            total = snapshot.total_records,
            per_tick = snapshot.records_per_tick,
            bucket = %snapshot.current_bucket,
            "status"
        );
        match serde_json::to_vec_pretty(snapshot) {
            Ok(bytes) => {
                if let Err(e) = tokio::fs::write(&self.status_path, bytes).await {
                    warn!(path = %self.status_path.display(), error = %e, "status write failed");
                }
            }
            Err(e) => warn!(error = %e, "status encode failed"),
        }
    }
}

#[async_trait]
impl Service for StatusReporter {
    fn name(&self) -> &'static str {
        "status-reporter"
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<()> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let snapshot = self.snapshot().await;
                    self.publish(&snapshot).await;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_shared::types::record::Record;

    fn reporter(dir: &std::path::Path) -> (StatusReporter, watch::Sender<RateSample>, Arc<Mutex<IngestionPipeline>>) {
        let counter = Arc::new(RollingCounter::new());
        let (rate_tx, rate_rx) = watch::channel(RateSample { ts: 0, count: 0 });
        let pipeline = Arc::new(Mutex::new(IngestionPipeline::new(dir.join("data"))));
        let r = StatusReporter::new(
            Duration::from_secs(1),
            dir.join("status.json"),
            counter,
            rate_rx,
            pipeline.clone(),
        );
        (r, rate_tx, pipeline)
    }

    #[tokio::test]
    async fn snapshot_reflects_counters_and_open_bucket() {
        let tmp = tempfile::tempdir().unwrap();
        let (r, rate_tx, pipeline) = reporter(tmp.path());

        assert_eq!(r.snapshot().await.current_bucket, "none");

        r.counter.record_arrival();
        r.counter.record_arrival();
        rate_tx.send(RateSample { ts: 7, count: 2 }).unwrap();
        pipeline
            .lock()
            .await
            .ingest(
                &Record {
                    ts: 1_709_967_600, // 2024-03-09 07:00:00 UTC
                    text: "x".to_string(),
                },
                1_709_967_600,
            )
            .unwrap();

        let s = r.snapshot().await;
        assert_eq!(s.total_records, 2);
        assert_eq!(s.records_per_tick, 2);
        assert_eq!(s.current_bucket, "2024-03-09_07");
    }

    #[tokio::test]
    async fn publish_writes_a_parseable_status_file() {
        let tmp = tempfile::tempdir().unwrap();
        let (r, _rate_tx, _pipeline) = reporter(tmp.path());
        let snapshot = r.snapshot().await;
        r.publish(&snapshot).await;

        let raw = std::fs::read(tmp.path().join("status.json")).unwrap();
        let parsed: StatusSnapshot = serde_json::from_slice(&raw).unwrap();
        assert_eq!(parsed.current_bucket, "none");
    }
}
