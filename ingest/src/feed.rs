//! Feed sources: where records come from.
//!
//! The built-in source reads JSON lines from stdin or a file, which is how
//! replayed captures and upstream relay processes deliver the stream. The
//! trait keeps the rest of the pipeline independent of the transport.

use std::collections::VecDeque;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::warn;

use sluice_shared::error::FeedError;
use sluice_shared::types::record::Record;
use sluice_shared::utils::time::epoch_secs;

/// An unbounded, ordered stream of records.
#[async_trait]
pub trait FeedSource: Send {
    /// Next record. `Ok(None)` means the feed is exhausted and will never
    /// produce again; `Err(Disconnected)` is transient and worth retrying.
    async fn next_record(&mut self) -> Result<Option<Record>, FeedError>;
}

/// Wire shape of one feed line. The timestamp is optional; lines without
/// one are stamped at arrival.
#[derive(Deserialize)]
struct FeedLine {
    text: String,
    #[serde(default)]
    ts: Option<i64>,
}

/// JSON-lines feed over any async byte stream. Malformed lines are logged
/// and skipped so one bad message never stalls ingestion.
pub struct JsonLinesFeed<R> {
    lines: tokio::io::Lines<BufReader<R>>,
}

impl JsonLinesFeed<tokio::io::Stdin> {
    pub fn stdin() -> Self {
        Self::new(tokio::io::stdin())
    }
}

impl JsonLinesFeed<tokio::fs::File> {
    pub async fn open(path: &Path) -> Result<Self, FeedError> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| FeedError::Disconnected(format!("{}: {e}", path.display())))?;
        Ok(Self::new(file))
    }
}

impl<R: AsyncRead + Unpin + Send> JsonLinesFeed<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> FeedSource for JsonLinesFeed<R> {
    async fn next_record(&mut self) -> Result<Option<Record>, FeedError> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| FeedError::Disconnected(e.to_string()))?;
            let Some(line) = line else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<FeedLine>(&line) {
                Ok(parsed) => {
                    return Ok(Some(Record {
                        ts: parsed.ts.unwrap_or_else(epoch_secs),
                        text: parsed.text,
                    }));
                }
                Err(e) => {
                    warn!(error = %e, "skipping malformed feed line");
                }
            }
        }
    }
}

/// Fixed sequence of records, for tests and dry runs.
#[derive(Default)]
pub struct ScriptedFeed {
    records: VecDeque<Record>,
}

impl ScriptedFeed {
    pub fn new(records: impl IntoIterator<Item = Record>) -> Self {
        Self {
            records: records.into_iter().collect(),
        }
    }
}

#[async_trait]
impl FeedSource for ScriptedFeed {
    async fn next_record(&mut self) -> Result<Option<Record>, FeedError> {
        Ok(self.records.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parses_lines_and_skips_malformed_ones() {
        let input = concat!(
            r#"{"ts": 100, "text": "first"}"#,
            "\n",
            "not json at all\n",
            "\n",
            r#"{"ts": 101, "text": "second"}"#,
            "\n",
        );
        let mut feed = JsonLinesFeed::new(input.as_bytes());

        let first = feed.next_record().await.unwrap().unwrap();
        assert_eq!((first.ts, first.text.as_str()), (100, "first"));
        let second = feed.next_record().await.unwrap().unwrap();
        assert_eq!(second.ts, 101);
        assert!(feed.next_record().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stamps_lines_that_carry_no_timestamp() {
        let mut feed = JsonLinesFeed::new(br#"{"text": "no ts"}"#.as_slice());
        let record = feed.next_record().await.unwrap().unwrap();
        assert!(record.ts > 0);
    }

    #[tokio::test]
    async fn scripted_feed_exhausts_in_order() {
        let mut feed = ScriptedFeed::new([
            Record {
                ts: 1,
                text: "a".into(),
            },
            Record {
                ts: 2,
                text: "b".into(),
            },
        ]);
        assert_eq!(feed.next_record().await.unwrap().unwrap().ts, 1);
        assert_eq!(feed.next_record().await.unwrap().unwrap().ts, 2);
        assert!(feed.next_record().await.unwrap().is_none());
    }
}
