//! Feed records and derived per-tick samples.

use serde::{Deserialize, Serialize};

/// Seconds since UNIX epoch.
pub type Timestamp = i64;

/// One feed message: arrival timestamp plus opaque text payload.
/// Immutable once received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub ts: Timestamp,
    pub text: String,
}

/// One rate-log entry: how many records arrived during a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSample {
    pub ts: Timestamp,
    pub count: u64,
}

/// A tick where EMA growth crossed the configured threshold.
///
/// `top_tokens` is empty when emitted by the live detector; the batch
/// processor fills it in from the records log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeEvent {
    pub ts: Timestamp,
    pub growth: f64,
    #[serde(default)]
    pub top_tokens: Vec<(String, u64)>,
}
