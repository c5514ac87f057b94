//! Exponential backoff for transient feed failures.

use std::time::Duration;

/// Doubling delay, capped at 30s, reset after the next success.
#[derive(Debug)]
pub struct Backoff {
    initial: Duration,
    current: Duration,
}

const MAX_DELAY: Duration = Duration::from_secs(30);

impl Backoff {
    pub fn new(initial: Duration) -> Self {
        Self {
            initial,
            current: initial,
        }
    }

    /// Delay to sleep before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(MAX_DELAY);
        delay
    }

    /// Call after a successful attempt.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}
