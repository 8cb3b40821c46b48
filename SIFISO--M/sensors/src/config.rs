use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Tunables for a [`crate::SensorStream`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SensorStreamConfig {
    /// Generator period in milliseconds.
    pub tick_ms: u64,
    /// Maximum retained snapshots.
    pub history_capacity: usize,
    /// Maximum snapshot age kept in history, in seconds.
    pub history_max_age_secs: u64,
    /// Per-subscriber buffer; older snapshots are dropped once a subscriber falls this far behind.
    pub subscriber_buffer: usize,
    /// Fixed RNG seed for reproducible synthetic data.
    pub seed: Option<u64>,
}

impl Default for SensorStreamConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1_000,
            history_capacity: 1_000,
            history_max_age_secs: 24 * 60 * 60,
            subscriber_buffer: 64,
            seed: None,
        }
    }
}

impl SensorStreamConfig {
    /// Generator period.
    #[must_use]
    pub fn tick(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_ms.max(1))
    }

    /// History age limit.
    #[must_use]
    pub fn history_max_age(&self) -> Duration {
        let secs = i64::try_from(self.history_max_age_secs)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1_000);
        Duration::seconds(secs)
    }

    /// Sets the RNG seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the subscriber buffer depth.
    #[must_use]
    pub const fn with_subscriber_buffer(mut self, buffer: usize) -> Self {
        self.subscriber_buffer = buffer;
        self
    }

    /// Sets the history cap.
    #[must_use]
    pub const fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Sets the generator period.
    #[must_use]
    pub const fn with_tick_ms(mut self, tick_ms: u64) -> Self {
        self.tick_ms = tick_ms;
        self
    }
}
