//! Error taxonomy shared by the ingestion pipeline and the batch processor.

use thiserror::Error;

/// Errors produced by a feed source.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The feed dropped the connection. Recoverable: the consumer backs off
    /// and retries while the current batch stays open.
    #[error("feed disconnected: {0}")]
    Disconnected(String),

    /// The feed will never produce another record. Terminal for the feed
    /// task; triggers the final seal-and-handoff of the open batch.
    #[error("feed exhausted")]
    Exhausted,
}

/// A malformed `TimeBucket` string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid time bucket {input:?}, expected YYYY-MM-DD_HH")]
pub struct BucketParseError {
    pub input: String,
}

/// Failures writing to the locally persisted batch.
///
/// `Write` and `Create` are fatal: the pipeline cannot recover the lost
/// record and must not keep writing to a possibly corrupt batch.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("write to batch {bucket} failed: {source}")]
    Write {
        bucket: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not create batch directory {path}: {source}")]
    Create {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The pipeline was closed (final seal already happened).
    #[error("ingestion pipeline is closed")]
    Closed,
}

/// Object store failures (upload/download/list of archived batches).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("object store i/o: {0}")]
    Io(#[from] std::io::Error),
}
