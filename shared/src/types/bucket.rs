//! Hour-granularity partition key for ingestion batches.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use std::fmt;
use std::str::FromStr;

use crate::error::BucketParseError;

/// Identifies one calendar hour (UTC). Total order follows calendar order,
/// and the string form sorts the same way the values do. Fields stay
/// private so every constructor upholds the valid-calendar-hour invariant;
/// the stable interchange form is the `Display`/`FromStr` string, which is
/// validated on the way in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeBucket {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
}

impl TimeBucket {
    /// Bucket containing the given instant.
    pub fn from_instant(t: DateTime<Utc>) -> Self {
        Self {
            year: t.year(),
            month: t.month(),
            day: t.day(),
            hour: t.hour(),
        }
    }

    /// Bucket containing the current wall-clock time.
    pub fn now() -> Self {
        Self::from_instant(Utc::now())
    }

    /// Bucket containing the given epoch-seconds timestamp, if representable.
    pub fn from_epoch_secs(secs: i64) -> Option<Self> {
        DateTime::<Utc>::from_timestamp(secs, 0).map(Self::from_instant)
    }

    /// First instant of this bucket.
    pub fn start(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(self.year, self.month, self.day, self.hour, 0, 0)
            .single()
            .expect("bucket fields always form a valid calendar hour")
    }

    /// The next calendar hour. Two buckets are adjacent when one's
    /// successor equals the other.
    pub fn successor(&self) -> Self {
        Self::from_instant(self.start() + Duration::hours(1))
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}_{:02}",
            self.year, self.month, self.day, self.hour
        )
    }
}

impl FromStr for TimeBucket {
    type Err = BucketParseError;

    /// Parses the stable `YYYY-MM-DD_HH` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || BucketParseError {
            input: s.to_string(),
        };

        // Fixed-width form: "YYYY-MM-DD_HH" is exactly 13 ASCII bytes.
        if s.len() != 13 || !s.is_ascii() {
            return Err(err());
        }
        let bytes = s.as_bytes();
        if bytes[4] != b'-' || bytes[7] != b'-' || bytes[10] != b'_' {
            return Err(err());
        }

        let year: i32 = s[0..4].parse().map_err(|_| err())?;
        let month: u32 = s[5..7].parse().map_err(|_| err())?;
        let day: u32 = s[8..10].parse().map_err(|_| err())?;
        let hour: u32 = s[11..13].parse().map_err(|_| err())?;

        // Reject calendar nonsense such as month 13 or hour 24.
        Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
            .single()
            .ok_or_else(err)?;

        Ok(Self {
            year,
            month,
            day,
            hour,
        })
    }
}
