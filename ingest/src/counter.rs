//! Lock-free arrival counter shared between the feed reader and the tick
//! loop.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counts record arrivals; the tick loop drains the in-flight count once
/// per tick while the running total keeps growing.
#[derive(Debug, Default)]
pub struct RollingCounter {
    in_flight: AtomicU64,
    total: AtomicU64,
}

impl RollingCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one arrival. Called from the feed path, possibly many times
    /// per tick.
    pub fn record_arrival(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Take the arrivals since the last drain. Every arrival lands in
    /// exactly one drained tick.
    pub fn drain_tick(&self) -> u64 {
        self.in_flight.swap(0, Ordering::Relaxed)
    }

    /// Arrivals since startup.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn drain_resets_in_flight_but_not_total() {
        let c = RollingCounter::new();
        for _ in 0..5 {
            c.record_arrival();
        }
        assert_eq!(c.drain_tick(), 5);
        assert_eq!(c.drain_tick(), 0);
        c.record_arrival();
        assert_eq!(c.drain_tick(), 1);
        assert_eq!(c.total(), 6);
    }

    #[tokio::test]
    async fn concurrent_arrivals_partition_across_drains() {
        let c = Arc::new(RollingCounter::new());
        let writers: Vec<_> = (0..4)
            .map(|_| {
                let c = c.clone();
                tokio::spawn(async move {
                    for _ in 0..1000 {
                        c.record_arrival();
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        let mut drained = 0u64;
        while c.total() < 4000 {
            drained += c.drain_tick();
            tokio::task::yield_now().await;
        }
        for w in writers {
            w.await.unwrap();
        }
        drained += c.drain_tick();

        assert_eq!(drained, 4000);
        assert_eq!(c.total(), 4000);
    }
}
