//! Runtime configuration for the ingestion service.

use std::path::PathBuf;
use std::time::Duration;

use sluice_processor::worker::ProcessorParams;
use sluice_processor::StoreConfig;

/// Where records come from.
#[derive(Debug, Clone)]
pub enum FeedConfig {
    Stdin,
    File(PathBuf),
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Feed source.
    pub feed: FeedConfig,

    /// Directory holding open and sealed-but-unarchived batches.
    pub data_dir: PathBuf,

    /// Archive backend for processed batches.
    pub store: StoreConfig,

    /// Path of the periodically rewritten status snapshot.
    pub status_path: PathBuf,

    /// Rate-sampling tick.
    pub tick_interval: Duration,

    /// Capacity of the batch handoff queue.
    pub queue_capacity: usize,

    /// Spike detection and content sampling tuning.
    pub processor: ProcessorParams,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = std::env::var("SLUICE_DATA_DIR").unwrap_or_else(|_| "data".to_string());
        let archive_dir =
            std::env::var("SLUICE_ARCHIVE_DIR").unwrap_or_else(|_| "archive".to_string());
        Self {
            feed: FeedConfig::Stdin,
            data_dir: PathBuf::from(data_dir),
            store: StoreConfig::Fs {
                root: PathBuf::from(archive_dir),
            },
            status_path: PathBuf::from(
                std::env::var("SLUICE_STATUS_FILE").unwrap_or_else(|_| "status.json".to_string()),
            ),
            tick_interval: Duration::from_secs(1),
            queue_capacity: 8,
            processor: ProcessorParams::default(),
        }
    }
}

impl Config {
    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tick_interval.is_zero() {
            anyhow::bail!("Tick interval must be greater than 0");
        }

        if self.queue_capacity == 0 {
            anyhow::bail!("Handoff queue capacity must be at least 1");
        }

        if self.processor.spike.ema_length == 0 {
            anyhow::bail!("EMA length must be at least 1");
        }

        if self.processor.spike.growth_length == 0 {
            anyhow::bail!("Growth length must be at least 1");
        }

        if !(self.processor.spike.spike_threshold > 0.0) {
            anyhow::bail!("Spike threshold must be a positive number");
        }

        if self.processor.top_k == 0 {
            anyhow::bail!("Top-k must be at least 1");
        }

        if self.processor.sample_window_secs < 0 {
            anyhow::bail!("Sample window must not be negative");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_queue_capacity_is_rejected() {
        let config = Config {
            queue_capacity: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        let config = Config {
            tick_interval: Duration::from_secs(0),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn nan_threshold_is_rejected() {
        let mut config = Config::default();
        config.processor.spike.spike_threshold = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_ema_length_is_rejected() {
        let mut config = Config::default();
        config.processor.spike.ema_length = 0;
        assert!(config.validate().is_err());
    }
}
