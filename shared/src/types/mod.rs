//! Core data model: buckets, records, samples, batches, status.

pub mod batch;
pub mod bucket;
pub mod record;
pub mod status;
