use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use sifiso_sensors::{clamp_unit, SensorSnapshot, StressBreakdown, StressLevel};

use super::config::WellnessConfig;

/// One stress observation kept in the rolling window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StressReading {
    /// Snapshot time.
    pub timestamp: DateTime<Utc>,
    /// Fused score.
    pub score: f64,
    /// Heart rate at the time.
    pub heart_rate: f64,
    /// HRV at the time.
    pub hrv_rmssd: f64,
    /// Skin conductance at the time.
    pub skin_conductance: f64,
    /// Breathing rate at the time.
    pub breathing_rate: f64,
}

impl StressReading {
    /// Builds a reading from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: &SensorSnapshot, breakdown: &StressBreakdown) -> Self {
        Self {
            timestamp: snapshot.timestamp,
            score: breakdown.score,
            heart_rate: snapshot.biosensors.heart_rate,
            hrv_rmssd: snapshot.biosensors.hrv_rmssd,
            skin_conductance: snapshot.biosensors.skin_conductance,
            breathing_rate: snapshot.biosensors.breathing_rate,
        }
    }
}

/// Point-in-time wellbeing assessment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WellnessAnalysis {
    /// Snapshot time.
    pub timestamp: DateTime<Utc>,
    /// Stress sub-scores and fused score.
    pub stress: StressBreakdown,
    /// Stress category.
    pub level: StressLevel,
    /// Activity in [0, 1].
    pub activity_level: f64,
    /// Continuous sitting so far, in whole minutes.
    pub sitting_minutes: i64,
    /// Continuous sitting so far, in seconds.
    pub sitting_seconds: i64,
    /// Hydration in [0, 1].
    pub hydration_level: f64,
    /// Accumulated weekly sleep debt in hours.
    pub sleep_debt_hours: f64,
    /// Overall wellbeing in [0, 1].
    pub wellbeing_score: f64,
    /// Whether any signal crossed an intervention threshold.
    pub requires_intervention: bool,
}

/// Activity from motion intensity and the rolling hourly step count.
#[must_use]
pub fn activity_level(motion_intensity: f64, steps_last_hour: u32) -> f64 {
    clamp_unit(motion_intensity * 0.5 + f64::from(steps_last_hour) / 1000.0 * 0.5)
}

/// Weekly sleep debt given a nightly target and the observed nightly average.
#[must_use]
pub fn sleep_debt_hours(target_hours: f64, average_hours: f64) -> f64 {
    ((target_hours - average_hours) * 7.0).max(0.0)
}

/// Sleep quality in [0, 1] derived from weekly sleep debt.
#[must_use]
pub fn sleep_quality(sleep_debt_hours: f64) -> f64 {
    clamp_unit(1.0 - sleep_debt_hours / 10.0)
}

/// `0.3*(1-stress) + 0.2*min(1, activity*2) + 0.2*hydration + 0.3*sleep_quality`.
#[must_use]
pub fn wellbeing_score(stress: f64, activity: f64, hydration: f64, sleep_quality: f64) -> f64 {
    clamp_unit(
        0.3 * (1.0 - clamp_unit(stress))
            + 0.2 * clamp_unit(activity * 2.0)
            + 0.2 * clamp_unit(hydration)
            + 0.3 * clamp_unit(sleep_quality),
    )
}

/// Assesses a snapshot given the sitting duration tracked so far.
#[must_use]
pub fn analyze_snapshot(
    snapshot: &SensorSnapshot,
    sitting: Duration,
    config: &WellnessConfig,
) -> WellnessAnalysis {
    let stress = StressBreakdown::from_biosensors(&snapshot.biosensors);
    let activity = activity_level(
        snapshot.motion.motion_intensity,
        snapshot.motion.steps_last_hour,
    );
    let hydration = clamp_unit(snapshot.biosensors.hydration_level);
    let sleep_debt = sleep_debt_hours(config.sleep_target_hours, config.average_sleep_hours);
    let sitting_minutes = sitting.num_minutes();
    let requires_intervention = stress.level() == StressLevel::High
        || sitting > Duration::minutes(config.extended_sitting_minutes)
        || hydration < config.hydration_threshold
        || (activity < config.low_activity_threshold && snapshot.timestamp.hour() < 20);
    WellnessAnalysis {
        timestamp: snapshot.timestamp,
        level: stress.level(),
        wellbeing_score: wellbeing_score(
            stress.score,
            activity,
            hydration,
            sleep_quality(sleep_debt),
        ),
        stress,
        activity_level: activity,
        sitting_minutes,
        sitting_seconds: sitting.num_seconds(),
        hydration_level: hydration,
        sleep_debt_hours: sleep_debt,
        requires_intervention,
    }
}

/// Direction of recent stress relative to the window average.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StressTrend {
    /// Latest reading clearly above the average.
    Increasing,
    /// Latest reading clearly below the average.
    Decreasing,
    /// Latest reading close to the average.
    Stable,
    /// No readings in the window.
    InsufficientData,
}

/// Aggregate view over a window of stress readings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StressPattern {
    /// Number of readings considered.
    pub readings: usize,
    /// Mean score over the window.
    pub average: f64,
    /// Readings above the HIGH threshold.
    pub peak_count: usize,
    /// Mean of the most recent readings.
    pub recent_average: f64,
    /// Direction of the latest reading.
    pub trend: StressTrend,
}

const TREND_TOLERANCE: f64 = 0.05;

impl StressPattern {
    /// Summarizes `readings` (oldest first), using the last `recent` for the recent mean.
    #[must_use]
    pub fn from_readings(readings: &[StressReading], recent: usize) -> Self {
        let Some(last) = readings.last() else {
            return Self {
                readings: 0,
                average: 0.0,
                peak_count: 0,
                recent_average: 0.0,
                trend: StressTrend::InsufficientData,
            };
        };
        let average = mean(readings.iter().map(|reading| reading.score));
        let tail = &readings[readings.len().saturating_sub(recent.max(1))..];
        let recent_average = mean(tail.iter().map(|reading| reading.score));
        let trend = if last.score > average + TREND_TOLERANCE {
            StressTrend::Increasing
        } else if last.score < average - TREND_TOLERANCE {
            StressTrend::Decreasing
        } else {
            StressTrend::Stable
        };
        Self {
            readings: readings.len(),
            average,
            peak_count: readings
                .iter()
                .filter(|reading| StressLevel::from_score(reading.score) == StressLevel::High)
                .count(),
            recent_average,
            trend,
        }
    }

    /// Whether the recent mean exceeds `ratio` times the window mean.
    #[must_use]
    pub fn is_escalating(&self, ratio: f64) -> bool {
        self.readings > 0 && self.recent_average > ratio * self.average
    }
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let count = values.len();
    if count == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let count = count as f64;
    values.sum::<f64>() / count
}

#[cfg(test)]
mod tests {
    use super::*;
    use sifiso_sensors::SensorDelta;

    fn reading(minutes_ago: i64, score: f64) -> StressReading {
        StressReading {
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            score,
            heart_rate: 70.0,
            hrv_rmssd: 40.0,
            skin_conductance: 5.0,
            breathing_rate: 16.0,
        }
    }

    #[test]
    fn activity_follows_formula() {
        assert!((activity_level(0.4, 600) - 0.5).abs() < 1e-9);
        assert!((activity_level(1.0, 5_000) - 1.0).abs() < f64::EPSILON);
        assert!(activity_level(0.0, 0).abs() < f64::EPSILON);
    }

    #[test]
    fn wellbeing_follows_formula() {
        let score = wellbeing_score(0.2, 0.3, 0.7, 0.5);
        let expected = 0.3 * 0.8 + 0.2 * 0.6 + 0.2 * 0.7 + 0.3 * 0.5;
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn default_sleep_assumptions_match_reference() {
        let debt = sleep_debt_hours(8.0, 7.2);
        assert!((debt - 5.6).abs() < 1e-9);
        assert!((sleep_quality(debt) - 0.44).abs() < 1e-9);
    }

    #[test]
    fn analysis_flags_low_hydration() {
        let now = Utc::now();
        let snapshot = SensorSnapshot::initial(now).apply(
            &SensorDelta::new().hydration(0.3).steps(0, 900).motion_intensity(0.5),
            now,
        );
        let analysis = analyze_snapshot(&snapshot, Duration::zero(), &WellnessConfig::default());
        assert!(analysis.requires_intervention);
        assert_eq!(analysis.level, StressLevel::Low);
        assert!((0.0..=1.0).contains(&analysis.wellbeing_score));
    }

    #[test]
    fn pattern_detects_escalation() {
        let mut readings: Vec<StressReading> = (0..20).map(|i| reading(60 - i, 0.2)).collect();
        readings.extend((0..5).map(|i| reading(5 - i, 0.9)));
        let pattern = StressPattern::from_readings(&readings, 5);
        assert_eq!(pattern.readings, 25);
        assert_eq!(pattern.peak_count, 5);
        assert!((pattern.recent_average - 0.9).abs() < 1e-9);
        assert_eq!(pattern.trend, StressTrend::Increasing);
        assert!(pattern.is_escalating(1.5));
    }

    #[test]
    fn flat_pattern_is_not_escalating() {
        let readings: Vec<StressReading> = (0..10).map(|i| reading(10 - i, 0.5)).collect();
        let pattern = StressPattern::from_readings(&readings, 5);
        assert_eq!(pattern.trend, StressTrend::Stable);
        assert!(!pattern.is_escalating(1.5));
        assert_eq!(
            StressPattern::from_readings(&[], 5).trend,
            StressTrend::InsufficientData
        );
    }
}
