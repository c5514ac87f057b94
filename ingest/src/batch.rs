//! The open hourly batch: two append-only JSON-lines logs inside a
//! directory named after the hour.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use sluice_shared::error::StorageError;
use sluice_shared::types::batch::{SealedBatch, RATE_LOG, RECORDS_LOG};
use sluice_shared::types::bucket::TimeBucket;
use sluice_shared::types::record::{RateSample, Record};

/// A batch that is still accepting writes. Sealing consumes it, so a
/// sealed batch can never be written to again.
#[derive(Debug)]
pub struct Batch {
    bucket: TimeBucket,
    dir: PathBuf,
    records: File,
    rates: File,
    record_count: u64,
}

impl Batch {
    /// Create (or reopen, after a crash) the directory and logs for
    /// `bucket` under `data_dir`.
    pub fn open(data_dir: &Path, bucket: TimeBucket) -> Result<Self, StorageError> {
        let dir = data_dir.join(bucket.to_string());
        std::fs::create_dir_all(&dir).map_err(|source| StorageError::Create {
            path: dir.display().to_string(),
            source,
        })?;
        let records = open_log(&dir, RECORDS_LOG)?;
        let rates = open_log(&dir, RATE_LOG)?;
        Ok(Self {
            bucket,
            dir,
            records,
            rates,
            record_count: 0,
        })
    }

    pub fn bucket(&self) -> TimeBucket {
        self.bucket
    }

    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Append one record to the records log.
    pub fn append_record(&mut self, record: &Record) -> Result<(), StorageError> {
        append_line(&mut self.records, record, self.bucket)?;
        self.record_count += 1;
        Ok(())
    }

    /// Append one per-tick sample to the rate log.
    pub fn append_rate(&mut self, sample: &RateSample) -> Result<(), StorageError> {
        append_line(&mut self.rates, sample, self.bucket)
    }

    /// Close the batch for writes and hand back its immutable description.
    pub fn seal(self) -> SealedBatch {
        SealedBatch {
            bucket: self.bucket,
            dir: self.dir,
            record_count: self.record_count,
        }
    }
}

fn open_log(dir: &Path, name: &str) -> Result<File, StorageError> {
    let path = dir.join(name);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| StorageError::Create {
            path: path.display().to_string(),
            source,
        })
}

/// One JSON value per line, flushed so a crash loses at most the line
/// being written.
fn append_line<T: Serialize>(
    file: &mut File,
    value: &T,
    bucket: TimeBucket,
) -> Result<(), StorageError> {
    let mut line = serde_json::to_vec(value).map_err(|e| StorageError::Write {
        bucket: bucket.to_string(),
        source: std::io::Error::other(e),
    })?;
    line.push(b'\n');
    file.write_all(&line).map_err(|source| StorageError::Write {
        bucket: bucket.to_string(),
        source,
    })?;
    file.flush().map_err(|source| StorageError::Write {
        bucket: bucket.to_string(),
        source,
    })
}
