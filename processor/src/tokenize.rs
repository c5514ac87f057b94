//! Tokenization seam used by spike-content sampling and the search
//! dictionary. Real deployments may plug in a proper text pipeline; the
//! built-in tokenizer mirrors the cleaning rules the archived feeds were
//! collected with.

use std::collections::HashSet;

/// Splits raw message text into normalized tokens.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Common English function words dropped from token counts.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "do", "for", "from", "had", "has",
    "have", "he", "her", "his", "i", "if", "in", "is", "it", "its", "just", "me", "my", "no",
    "not", "of", "on", "or", "our", "she", "so", "that", "the", "their", "they", "this", "to",
    "u", "up", "was", "we", "were", "what", "when", "who", "will", "with", "you", "your",
];

/// Lowercases, strips surrounding punctuation, drops stopwords, and drops
/// feed noise: retweet markers, hashtags, mentions, and links.
pub struct BasicTokenizer {
    stopwords: HashSet<&'static str>,
}

impl Default for BasicTokenizer {
    fn default() -> Self {
        Self {
            stopwords: STOPWORDS.iter().copied().collect(),
        }
    }
}

impl Tokenizer for BasicTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        text.split_whitespace()
            .filter_map(|word| {
                let lower = word.to_lowercase();
                // Noise check runs before punctuation trimming so the
                // mention/hashtag markers are still visible.
                if lower.contains('#') || lower.contains('@') || lower.contains("http") {
                    return None;
                }
                let token = lower
                    .trim_matches(|c: char| !c.is_alphanumeric())
                    .to_string();
                if token.is_empty() || token == "rt" || self.stopwords.contains(token.as_str()) {
                    return None;
                }
                Some(token)
            })
            .collect()
    }
}
