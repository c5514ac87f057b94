//! Status snapshot schema consumed by external reporting surfaces.

use serde::{Deserialize, Serialize};

/// Point-in-time view of ingestion counters. Produced once per second by
/// the status reporter; every field comes from a single consistent read,
/// never a partially updated one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Seconds since the pipeline started.
    pub duration_seconds: u64,
    /// Records ingested since start.
    pub total_records: u64,
    /// Records counted during the most recent tick.
    pub records_per_tick: u64,
    /// The hour currently being written, in `YYYY-MM-DD_HH` form.
    pub current_bucket: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serializes_with_stable_field_names() {
        let s = StatusSnapshot {
            duration_seconds: 61,
            total_records: 1200,
            records_per_tick: 19,
            current_bucket: "2024-03-09_07".to_string(),
        };
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["duration_seconds"], 61);
        assert_eq!(json["total_records"], 1200);
        assert_eq!(json["records_per_tick"], 19);
        assert_eq!(json["current_bucket"], "2024-03-09_07");
    }
}
