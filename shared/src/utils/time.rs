//! Time-related utilities

use std::time::{SystemTime, UNIX_EPOCH};

/// Current system time in seconds since UNIX epoch.
pub fn epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX epoch")
        .as_secs() as i64
}
