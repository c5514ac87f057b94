//! Shared types and utilities for Sluice
//!
//! This crate contains the common data model used across the ingestion
//! pipeline and the batch processor: the hourly `TimeBucket` partition key,
//! feed records, rate samples, sealed batches, the status snapshot schema,
//! and the error taxonomy.

pub mod error;
pub mod service;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::{BucketParseError, FeedError, StorageError, StoreError};
pub use types::{batch::SealedBatch, bucket::TimeBucket, record::*, status::StatusSnapshot};
