//! Hourly batch rotation.
//!
//! The pipeline owns at most one open batch. Rotation is keyed by the
//! arrival wall clock, never by a payload-supplied timestamp: the first
//! write whose arrival hour is past the open batch's hour seals the old
//! batch and opens the next one. Sealing is atomic from the caller's
//! view: the write that triggered rotation always lands in the new batch.

use std::path::PathBuf;

use tracing::{info, warn};

use sluice_shared::error::StorageError;
use sluice_shared::types::batch::SealedBatch;
use sluice_shared::types::bucket::TimeBucket;
use sluice_shared::types::record::{RateSample, Record, Timestamp};

use crate::batch::Batch;

pub struct IngestionPipeline {
    data_dir: PathBuf,
    current: Option<Batch>,
    closed: bool,
}

impl IngestionPipeline {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            current: None,
            closed: false,
        }
    }

    /// Hour of the open batch, if any.
    pub fn current_bucket(&self) -> Option<TimeBucket> {
        self.current.as_ref().map(|b| b.bucket())
    }

    /// Records written to the open batch so far.
    pub fn open_record_count(&self) -> u64 {
        self.current.as_ref().map(|b| b.record_count()).unwrap_or(0)
    }

    /// Append a record, rotating first if the arrival hour (`now`) is
    /// past the open batch's hour. The record's embedded `ts` is payload
    /// data and never drives rotation, so a feed line carrying a bogus
    /// timestamp cannot wedge the pipeline in a far-future bucket.
    /// Returns the sealed previous batch when rotation happened.
    pub fn ingest(
        &mut self,
        record: &Record,
        now: Timestamp,
    ) -> Result<Option<SealedBatch>, StorageError> {
        let sealed = self.rotate_if_needed(now)?;
        if let Some(batch) = self.current.as_mut() {
            batch.append_record(record)?;
        }
        Ok(sealed)
    }

    /// Append a per-tick rate sample, with the same rotation rule as
    /// `ingest`. The sample timestamp is the tick's wall clock.
    pub fn record_tick(&mut self, sample: &RateSample) -> Result<Option<SealedBatch>, StorageError> {
        let sealed = self.rotate_if_needed(sample.ts)?;
        if let Some(batch) = self.current.as_mut() {
            batch.append_rate(sample)?;
        }
        Ok(sealed)
    }

    /// Seal the open batch and refuse all further writes.
    pub fn close(&mut self) -> Result<Option<SealedBatch>, StorageError> {
        if self.closed {
            return Err(StorageError::Closed);
        }
        self.closed = true;
        let sealed = self.current.take().map(Batch::seal);
        if let Some(batch) = &sealed {
            info!(bucket = %batch.bucket, records = batch.record_count, "final batch sealed");
        }
        Ok(sealed)
    }

    /// Ensure an open batch exists for the arrival instant `now`.
    ///
    /// Rotation only moves forward: an arrival clocked at or before the
    /// open batch's hour appends to the open batch, so a sealed hour is
    /// never reopened even if the clock steps backwards.
    fn rotate_if_needed(&mut self, now: Timestamp) -> Result<Option<SealedBatch>, StorageError> {
        if self.closed {
            return Err(StorageError::Closed);
        }
        let bucket = TimeBucket::from_epoch_secs(now).ok_or_else(|| StorageError::Write {
            bucket: format!("ts {now}"),
            source: std::io::Error::other("timestamp out of calendar range"),
        })?;

        match self.current.as_ref().map(|b| b.bucket()) {
            None => {
                self.current = Some(Batch::open(&self.data_dir, bucket)?);
                info!(bucket = %bucket, "batch opened");
                Ok(None)
            }
            Some(open) if bucket > open => {
                let sealed = self.current.take().map(Batch::seal);
                self.current = Some(Batch::open(&self.data_dir, bucket)?);
                if let Some(batch) = &sealed {
                    info!(
                        from = %batch.bucket,
                        to = %bucket,
                        records = batch.record_count,
                        "batch rotated"
                    );
                }
                Ok(sealed)
            }
            Some(open) => {
                if bucket < open {
                    warn!(arrival_hour = %bucket, open_hour = %open, "clock stepped back, write kept in open batch");
                }
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-03-09 06:59:59 UTC and friends.
    const T_0659: i64 = 1_709_967_599;
    const T_0700: i64 = T_0659 + 1;
    const T_0800: i64 = T_0700 + 3600;

    fn record(ts: i64) -> Record {
        Record {
            ts,
            text: format!("at {ts}"),
        }
    }

    #[test]
    fn first_write_opens_a_batch_without_sealing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut p = IngestionPipeline::new(tmp.path().to_path_buf());
        assert!(p.ingest(&record(T_0700), T_0700).unwrap().is_none());
        assert_eq!(p.current_bucket().unwrap().to_string(), "2024-03-09_07");
        assert_eq!(p.open_record_count(), 1);
    }

    #[test]
    fn crossing_the_hour_seals_the_old_batch() {
        let tmp = tempfile::tempdir().unwrap();
        let mut p = IngestionPipeline::new(tmp.path().to_path_buf());
        p.ingest(&record(T_0700), T_0700).unwrap();
        p.ingest(&record(T_0700 + 10), T_0700 + 10).unwrap();

        let sealed = p
            .ingest(&record(T_0800), T_0800)
            .unwrap()
            .expect("rotation");
        assert_eq!(sealed.bucket.to_string(), "2024-03-09_07");
        assert_eq!(sealed.record_count, 2);
        // The triggering record went to the new batch.
        assert_eq!(p.current_bucket().unwrap().to_string(), "2024-03-09_08");
        assert_eq!(p.open_record_count(), 1);
    }

    #[test]
    fn rotation_works_across_midnight() {
        let tmp = tempfile::tempdir().unwrap();
        let mut p = IngestionPipeline::new(tmp.path().to_path_buf());
        // 2024-03-09 23:59:59 -> 2024-03-10 00:00:01
        let last = 1_710_028_799;
        p.ingest(&record(last), last).unwrap();
        let sealed = p
            .ingest(&record(last + 2), last + 2)
            .unwrap()
            .expect("rotation");
        assert_eq!(sealed.bucket.to_string(), "2024-03-09_23");
        assert_eq!(p.current_bucket().unwrap().to_string(), "2024-03-10_00");
    }

    #[test]
    fn backwards_clock_step_stays_in_the_open_batch() {
        let tmp = tempfile::tempdir().unwrap();
        let mut p = IngestionPipeline::new(tmp.path().to_path_buf());
        p.ingest(&record(T_0800), T_0800).unwrap();
        // Arrival clocked before the open hour: no rotation backwards.
        assert!(p.ingest(&record(T_0659), T_0659).unwrap().is_none());
        assert_eq!(p.current_bucket().unwrap().to_string(), "2024-03-09_08");
        assert_eq!(p.open_record_count(), 2);
    }

    #[test]
    fn bogus_payload_timestamp_never_drives_rotation() {
        let tmp = tempfile::tempdir().unwrap();
        let mut p = IngestionPipeline::new(tmp.path().to_path_buf());
        p.ingest(&record(T_0700), T_0700).unwrap();

        // A feed line carrying milliseconds instead of seconds would put
        // its bucket tens of millennia out; only the arrival clock counts.
        assert!(p
            .ingest(&record(T_0700 * 1000), T_0700 + 1)
            .unwrap()
            .is_none());
        assert_eq!(p.current_bucket().unwrap().to_string(), "2024-03-09_07");
        assert_eq!(p.open_record_count(), 2);

        // The next real hour still rotates normally.
        let sealed = p
            .ingest(&record(T_0800), T_0800)
            .unwrap()
            .expect("rotation");
        assert_eq!(sealed.bucket.to_string(), "2024-03-09_07");
        assert_eq!(p.current_bucket().unwrap().to_string(), "2024-03-09_08");
    }

    #[test]
    fn rate_samples_rotate_like_records() {
        let tmp = tempfile::tempdir().unwrap();
        let mut p = IngestionPipeline::new(tmp.path().to_path_buf());
        p.record_tick(&RateSample { ts: T_0700, count: 3 }).unwrap();
        let sealed = p
            .record_tick(&RateSample { ts: T_0800, count: 1 })
            .unwrap()
            .expect("rotation");
        assert_eq!(sealed.bucket.to_string(), "2024-03-09_07");
        assert_eq!(sealed.record_count, 0);
    }

    #[test]
    fn close_seals_once_then_rejects_writes() {
        let tmp = tempfile::tempdir().unwrap();
        let mut p = IngestionPipeline::new(tmp.path().to_path_buf());
        p.ingest(&record(T_0700), T_0700).unwrap();

        let sealed = p.close().unwrap().expect("open batch sealed");
        assert_eq!(sealed.record_count, 1);

        assert!(matches!(
            p.ingest(&record(T_0700), T_0700),
            Err(StorageError::Closed)
        ));
        assert!(matches!(p.close(), Err(StorageError::Closed)));
    }

    #[test]
    fn close_with_no_open_batch_yields_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut p = IngestionPipeline::new(tmp.path().to_path_buf());
        assert!(p.close().unwrap().is_none());
    }
}
