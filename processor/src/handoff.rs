//! Bounded handoff between the ingestion pipeline and the batch worker.
//!
//! Sealed batches move through a fixed-capacity channel: when the worker
//! falls behind, the producer blocks on `push` instead of buffering an
//! unbounded backlog. Delivery is at-least-once from the producer's point
//! of view; the consumer sees batches in seal order.

use thiserror::Error;
use tokio::sync::mpsc;

use sluice_shared::types::batch::SealedBatch;

/// The consumer side has been dropped. The undelivered batch is handed
/// back so its directory can be left on disk for operator recovery.
#[derive(Debug, Error)]
#[error("batch handoff closed, {} left on disk", .0.bucket)]
pub struct HandoffClosed(pub SealedBatch);

/// Create the bounded queue. Capacity must be at least 1.
pub fn bounded(capacity: usize) -> (BatchSender, BatchReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (BatchSender { tx }, BatchReceiver { rx })
}

/// Producer handle; cloned into the ingestion side.
#[derive(Clone)]
pub struct BatchSender {
    tx: mpsc::Sender<SealedBatch>,
}

impl BatchSender {
    /// Enqueue a sealed batch, waiting while the queue is full.
    pub async fn push(&self, batch: SealedBatch) -> Result<(), HandoffClosed> {
        self.tx.send(batch).await.map_err(|e| HandoffClosed(e.0))
    }
}

/// Consumer handle, held by the processor worker.
pub struct BatchReceiver {
    rx: mpsc::Receiver<SealedBatch>,
}

impl BatchReceiver {
    /// Next sealed batch, or `None` once every sender is gone and the
    /// queue has drained.
    pub async fn pop(&mut self) -> Option<SealedBatch> {
        self.rx.recv().await
    }
}
