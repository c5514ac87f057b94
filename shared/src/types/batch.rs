//! Sealed batch handle passed from the ingestion pipeline to the processor.

use std::path::PathBuf;

use crate::types::bucket::TimeBucket;

/// Records log file name inside a batch directory.
pub const RECORDS_LOG: &str = "records.jsonl";

/// Rate log file name inside a batch directory.
pub const RATE_LOG: &str = "rate.jsonl";

/// An hourly batch that has been sealed: closed for writes, immutable,
/// handed off to the processor at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBatch {
    /// The hour this batch covers.
    pub bucket: TimeBucket,
    /// Local directory holding the records and rate logs.
    pub dir: PathBuf,
    /// Records written while the batch was open.
    pub record_count: u64,
}
