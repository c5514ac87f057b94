//! Batch-processing side of Sluice.
//!
//! Consumes sealed hourly batches from the ingestion pipeline, replays
//! their rate logs through the spike detector, samples spike contents from
//! the records log, uploads the batch plus derived artifacts to an object
//! store, and answers keyword-frequency queries over archived hours.

pub mod contents;
pub mod handoff;
pub mod search;
pub mod spike;
pub mod store;
pub mod tokenize;
pub mod worker;

pub use spike::{SpikeDetector, SpikeParams};
pub use store::{ObjectStore, StoreConfig};
pub use worker::{Processor, ProcessorParams};
