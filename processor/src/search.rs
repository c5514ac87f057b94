//! Keyword search over archived hours.
//!
//! Each archived batch carries a `tokens.json` dictionary; a search walks
//! the requested hour range and reads only those dictionaries, never the
//! raw records logs.

use std::collections::BTreeMap;

use tracing::debug;

use sluice_shared::error::StoreError;
use sluice_shared::types::bucket::TimeBucket;

use crate::store::ObjectStore;
use crate::worker::TOKENS_INDEX;

/// Occurrences of `keyword` in each archived hour from `start` through
/// `end`, inclusive. Hours with no archived batch are skipped; hours where
/// the keyword never appears report zero. Matching is exact on the
/// normalized token, so the keyword is lowercased first.
pub async fn search(
    store: &dyn ObjectStore,
    keyword: &str,
    start: TimeBucket,
    end: TimeBucket,
) -> Result<BTreeMap<String, u64>, StoreError> {
    let keyword = keyword.to_lowercase();
    let mut hits = BTreeMap::new();

    let mut bucket = start;
    while bucket <= end {
        match store.get(&format!("{bucket}/{TOKENS_INDEX}")).await {
            Ok(bytes) => {
                let tokens: BTreeMap<String, u64> = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::Io(std::io::Error::other(e)))?;
                let count = tokens.get(&keyword).copied().unwrap_or(0);
                hits.insert(bucket.to_string(), count);
            }
            Err(StoreError::NotFound(_)) => {
                debug!(%bucket, "no archived batch for hour");
            }
            Err(e) => return Err(e),
        }
        bucket = bucket.successor();
    }

    Ok(hits)
}
