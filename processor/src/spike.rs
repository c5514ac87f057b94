//! Streaming spike detection: exponential moving average over per-tick
//! arrival counts, with relative growth thresholding.
//!
//! The algorithm is inherently sequential: samples must be fed in tick
//! order, and each EMA value depends on the previous one. The same
//! detector type serves both the live tick path and the replay of a
//! sealed batch's rate log, so the two paths always agree.

use sluice_shared::types::record::{SpikeEvent, Timestamp};

/// Detector tuning.
#[derive(Debug, Clone)]
pub struct SpikeParams {
    /// Warmup length: the EMA seed is the plain mean of this many raw
    /// counts, and the smoothing constant is `k = 2 / (ema_length + 1)`.
    pub ema_length: usize,
    /// How many ticks back the growth ratio compares against.
    pub growth_length: usize,
    /// Growth at or above this ratio is a spike (inclusive).
    pub spike_threshold: f64,
}

impl Default for SpikeParams {
    fn default() -> Self {
        Self {
            ema_length: 20,
            growth_length: 5,
            spike_threshold: 1.3,
        }
    }
}

/// Online EMA/growth computation over an ordered sequence of
/// `(timestamp, count)` samples. Memory is bounded by the number of ticks
/// in one hour when replaying a batch; the live instance keeps the series
/// only for inspection and stays small at one sample per second.
#[derive(Debug)]
pub struct SpikeDetector {
    params: SpikeParams,
    k: f64,
    /// Raw counts seen before the seed EMA exists.
    warmup: Vec<f64>,
    ema_series: Vec<(Timestamp, f64)>,
    growth_series: Vec<(Timestamp, f64)>,
    sample_index: usize,
    last_ema: Option<f64>,
}

impl SpikeDetector {
    pub fn new(params: SpikeParams) -> Self {
        let k = 2.0 / (params.ema_length as f64 + 1.0);
        Self {
            warmup: Vec::with_capacity(params.ema_length),
            ema_series: Vec::new(),
            growth_series: Vec::new(),
            sample_index: 0,
            last_ema: None,
            params,
            k,
        }
    }

    /// Feed the next tick. Returns a `SpikeEvent` (without contents) when
    /// growth crosses the threshold at this tick.
    ///
    /// Sample index semantics, 0-indexed:
    /// - ticks `0..ema_length` accumulate the warmup buffer and produce no
    ///   EMA value;
    /// - tick `ema_length` seeds the EMA with the arithmetic mean of the
    ///   warmup counts;
    /// - later ticks apply `ema = count*k + last*(1-k)`;
    /// - growth exists from tick `ema_length + growth_length` onward,
    ///   comparing against the EMA `growth_length` entries back.
    ///
    /// A zero base EMA is a valid zero-traffic state: the growth value for
    /// that tick is skipped rather than reported as an error.
    pub fn ingest_tick(&mut self, ts: Timestamp, count: u64) -> Option<SpikeEvent> {
        let i = self.sample_index;
        let n = self.params.ema_length;
        let count = count as f64;

        if i < n {
            self.warmup.push(count);
        } else if i == n {
            let seed = self.warmup.iter().sum::<f64>() / n as f64;
            self.ema_series.push((ts, seed));
            self.last_ema = Some(seed);
        } else if let Some(last) = self.last_ema {
            let ema = count * self.k + last * (1.0 - self.k);
            self.ema_series.push((ts, ema));
            self.last_ema = Some(ema);
        }

        let mut spike = None;
        if i >= n + self.params.growth_length {
            // ema_series holds one entry per tick since tick n, so the
            // current tick sits at the end and the comparison point is
            // growth_length entries before it.
            let cur = self.ema_series.len() - 1;
            let (_, current) = self.ema_series[cur];
            let (_, base) = self.ema_series[cur - self.params.growth_length];
            if base != 0.0 {
                let growth = (current - base) / base;
                self.growth_series.push((ts, growth));
                if growth >= self.params.spike_threshold {
                    spike = Some(SpikeEvent {
                        ts,
                        growth,
                        top_tokens: Vec::new(),
                    });
                }
            }
        }

        self.sample_index += 1;
        spike
    }

    /// EMA values so far, one per tick once warmup has elapsed.
    pub fn ema_series(&self) -> &[(Timestamp, f64)] {
        &self.ema_series
    }

    /// Growth ratios so far; zero-base ticks are absent.
    pub fn growth_series(&self) -> &[(Timestamp, f64)] {
        &self.growth_series
    }

    /// Ticks processed so far.
    pub fn samples_seen(&self) -> usize {
        self.sample_index
    }
}
