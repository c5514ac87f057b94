//! Content sampling for detected spikes: the top-K most frequent tokens
//! among records arriving inside the sample window.

use std::collections::HashMap;

use sluice_shared::types::record::{Record, Timestamp};

use crate::tokenize::Tokenizer;

/// Top-K tokens among records with `start <= ts <= start + window_secs`.
///
/// The records log is mostly timestamp-ordered but not guaranteed to be:
/// payload timestamps are caller-supplied and writes clocked across a
/// rotation can interleave. The scan therefore visits every record and
/// filters by the window rather than binary-searching; a batch covers a
/// single hour, so the slice is bounded anyway.
/// Deterministic: ties are broken by token, ascending.
pub fn find_spike_contents(
    records: &[Record],
    start: Timestamp,
    window_secs: i64,
    top_k: usize,
    tokenizer: &dyn Tokenizer,
) -> Vec<(String, u64)> {
    let end = start + window_secs;

    let mut counts: HashMap<String, u64> = HashMap::new();
    for record in records.iter().filter(|r| r.ts >= start && r.ts <= end) {
        for token in tokenizer.tokenize(&record.text) {
            *counts.entry(token).or_insert(0) += 1;
        }
    }

    top_k_tokens(counts, top_k)
}

/// Frequency of every token across a whole batch, for the per-hour search
/// dictionary.
pub fn token_frequencies(records: &[Record], tokenizer: &dyn Tokenizer) -> HashMap<String, u64> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for record in records {
        for token in tokenizer.tokenize(&record.text) {
            *counts.entry(token).or_insert(0) += 1;
        }
    }
    counts
}

fn top_k_tokens(counts: HashMap<String, u64>, top_k: usize) -> Vec<(String, u64)> {
    let mut ranked: Vec<(String, u64)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(top_k);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenize::BasicTokenizer;

    fn record(ts: Timestamp, text: &str) -> Record {
        Record {
            ts,
            text: text.to_string(),
        }
    }

    #[test]
    fn window_is_inclusive_on_both_ends() {
        let tok = BasicTokenizer::default();
        let records = vec![
            record(99, "before before before"),
            record(100, "burst"),
            record(105, "burst burst"),
            record(110, "burst edge"),
            record(111, "after after after after"),
        ];
        let top = find_spike_contents(&records, 100, 10, 3, &tok);
        assert_eq!(top[0], ("burst".to_string(), 4));
        assert!(top.iter().all(|(t, _)| t != "before" && t != "after"));
    }

    #[test]
    fn out_of_order_records_still_count_toward_the_window() {
        let tok = BasicTokenizer::default();
        // A straggler with an in-window timestamp appended after a record
        // that is already past the window.
        let records = vec![
            record(100, "burst"),
            record(120, "after"),
            record(105, "burst straggler"),
        ];
        let top = find_spike_contents(&records, 100, 10, 3, &tok);
        assert_eq!(top[0], ("burst".to_string(), 2));
        assert!(top.iter().any(|(t, _)| t == "straggler"));
        assert!(top.iter().all(|(t, _)| t != "after"));
    }

    #[test]
    fn ties_break_by_token_ascending() {
        let tok = BasicTokenizer::default();
        let records = vec![record(0, "zebra apple zebra apple mango")];
        let top = find_spike_contents(&records, 0, 0, 2, &tok);
        assert_eq!(
            top,
            vec![("apple".to_string(), 2), ("zebra".to_string(), 2)]
        );
    }

    #[test]
    fn rerunning_over_a_sealed_batch_is_idempotent() {
        let tok = BasicTokenizer::default();
        let records: Vec<Record> = (0..50)
            .map(|i| record(i, "storm warning issued storm"))
            .collect();
        let a = find_spike_contents(&records, 10, 20, 5, &tok);
        let b = find_spike_contents(&records, 10, 20, 5, &tok);
        assert_eq!(a, b);
    }

    #[test]
    fn batch_frequencies_count_every_record() {
        let tok = BasicTokenizer::default();
        let records = vec![record(1, "alpha beta"), record(2, "beta")];
        let freqs = token_frequencies(&records, &tok);
        assert_eq!(freqs.get("beta"), Some(&2));
        assert_eq!(freqs.get("alpha"), Some(&1));
    }
}
