use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Wellness thresholds, cooldowns and loop periods.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WellnessConfig {
    /// Sitting longer than this triggers a movement break.
    pub sitting_threshold_minutes: i64,
    /// Minimum gap between movement breaks.
    pub sitting_cooldown_minutes: i64,
    /// Sitting longer than this marks the analysis as needing intervention.
    pub extended_sitting_minutes: i64,
    /// Hydration below this triggers a reminder.
    pub hydration_threshold: f64,
    /// Minimum gap between hydration reminders.
    pub hydration_interval_minutes: i64,
    /// Minimum gap between HIGH-stress breathing breaks; unset fires on every HIGH reading.
    pub stress_cooldown_minutes: Option<i64>,
    /// Activity below this (before 20:00) marks the analysis as needing intervention.
    pub low_activity_threshold: f64,
    /// Period of the pattern-analysis loop.
    pub pattern_interval_secs: u64,
    /// Length of the rolling stress window.
    pub stress_window_hours: i64,
    /// Readings averaged as "recent" by the pattern check.
    pub pattern_recent_readings: usize,
    /// Recent-to-window ratio above which a pattern is reported.
    pub pattern_ratio: f64,
    /// History window read for trend logging.
    pub trend_window_minutes: i64,
    /// Nightly sleep target.
    pub sleep_target_hours: f64,
    /// Observed nightly sleep average.
    pub average_sleep_hours: f64,
}

impl Default for WellnessConfig {
    fn default() -> Self {
        Self {
            sitting_threshold_minutes: 90,
            sitting_cooldown_minutes: 30,
            extended_sitting_minutes: 120,
            hydration_threshold: 0.4,
            hydration_interval_minutes: 120,
            stress_cooldown_minutes: None,
            low_activity_threshold: 0.2,
            pattern_interval_secs: 60,
            stress_window_hours: 24,
            pattern_recent_readings: 5,
            pattern_ratio: 1.5,
            trend_window_minutes: 60,
            sleep_target_hours: 8.0,
            average_sleep_hours: 7.2,
        }
    }
}

impl WellnessConfig {
    /// Sitting threshold as a duration.
    #[must_use]
    pub fn sitting_threshold(&self) -> Duration {
        Duration::minutes(self.sitting_threshold_minutes)
    }

    /// Sitting cooldown as a duration.
    #[must_use]
    pub fn sitting_cooldown(&self) -> Duration {
        Duration::minutes(self.sitting_cooldown_minutes)
    }

    /// Hydration interval as a duration.
    #[must_use]
    pub fn hydration_interval(&self) -> Duration {
        Duration::minutes(self.hydration_interval_minutes)
    }

    /// Stress cooldown, if configured.
    #[must_use]
    pub fn stress_cooldown(&self) -> Option<Duration> {
        self.stress_cooldown_minutes.map(Duration::minutes)
    }

    /// Rolling stress window.
    #[must_use]
    pub fn stress_window(&self) -> Duration {
        Duration::hours(self.stress_window_hours)
    }

    /// Trend history window.
    #[must_use]
    pub fn trend_window(&self) -> Duration {
        Duration::minutes(self.trend_window_minutes)
    }

    /// Pattern loop period.
    #[must_use]
    pub fn pattern_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.pattern_interval_secs.max(1))
    }
}
