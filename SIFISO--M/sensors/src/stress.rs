//! Multi-signal stress fusion.

use serde::{Deserialize, Serialize};

use crate::model::BiosensorReadings;

const HEART_RATE_WEIGHT: f64 = 0.30;
const HRV_WEIGHT: f64 = 0.35;
const SKIN_CONDUCTANCE_WEIGHT: f64 = 0.20;
const BREATHING_WEIGHT: f64 = 0.15;

/// Score above which stress is [`StressLevel::High`].
pub const HIGH_STRESS_THRESHOLD: f64 = 0.7;
/// Score above which stress is [`StressLevel::Moderate`].
pub const MODERATE_STRESS_THRESHOLD: f64 = 0.4;

/// Clamps to [0, 1], mapping NaN to 0.
#[must_use]
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Categorized stress.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StressLevel {
    /// Score ≤ 0.4.
    Low,
    /// 0.4 < score ≤ 0.7.
    Moderate,
    /// Score > 0.7.
    High,
}

impl StressLevel {
    /// Categorizes a score.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score > HIGH_STRESS_THRESHOLD {
            Self::High
        } else if score > MODERATE_STRESS_THRESHOLD {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    /// Upper-case label used in logs and notifications.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Moderate => "MODERATE",
            Self::High => "HIGH",
        }
    }
}

/// Suggested intervention for a stress level.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct StressRecommendation {
    /// Machine-readable intervention kind.
    pub kind: &'static str,
    /// Short title shown to the user.
    pub title: &'static str,
    /// Suggested duration in minutes.
    pub duration_minutes: u32,
}

/// Per-signal sub-scores and the fused stress score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StressBreakdown {
    /// Heart-rate sub-score.
    pub heart_rate: f64,
    /// HRV sub-score.
    pub hrv: f64,
    /// Skin-conductance sub-score.
    pub skin_conductance: f64,
    /// Breathing-rate sub-score.
    pub breathing: f64,
    /// Weighted sum in [0, 1].
    pub score: f64,
}

impl StressBreakdown {
    /// Fuses the four stress-relevant biosignals.
    #[must_use]
    pub fn from_biosensors(readings: &BiosensorReadings) -> Self {
        Self::from_signals(
            readings.heart_rate,
            readings.hrv_rmssd,
            readings.skin_conductance,
            readings.breathing_rate,
        )
    }

    /// Fuses raw signal values.
    #[must_use]
    pub fn from_signals(
        heart_rate: f64,
        hrv_rmssd: f64,
        skin_conductance: f64,
        breathing_rate: f64,
    ) -> Self {
        let heart_rate = clamp_unit((heart_rate - 60.0) / 40.0);
        let hrv = clamp_unit((50.0 - hrv_rmssd) / 40.0);
        let skin_conductance = clamp_unit((skin_conductance - 5.0) / 10.0);
        let breathing = clamp_unit((breathing_rate - 12.0) / 10.0);
        let score = clamp_unit(
            HEART_RATE_WEIGHT * heart_rate
                + HRV_WEIGHT * hrv
                + SKIN_CONDUCTANCE_WEIGHT * skin_conductance
                + BREATHING_WEIGHT * breathing,
        );
        Self {
            heart_rate,
            hrv,
            skin_conductance,
            breathing,
            score,
        }
    }

    /// Level of the fused score.
    #[must_use]
    pub fn level(&self) -> StressLevel {
        StressLevel::from_score(self.score)
    }

    /// Intervention suggested for the current level, if any.
    #[must_use]
    pub fn recommendation(&self) -> Option<StressRecommendation> {
        match self.level() {
            StressLevel::High => Some(StressRecommendation {
                kind: "breathing_exercise",
                title: "Take a Breathing Break",
                duration_minutes: 5,
            }),
            StressLevel::Moderate => Some(StressRecommendation {
                kind: "movement_break",
                title: "Stretch and Move",
                duration_minutes: 3,
            }),
            StressLevel::Low => None,
        }
    }
}

/// Fused stress score for a set of readings.
#[must_use]
pub fn stress_score(readings: &BiosensorReadings) -> f64 {
    StressBreakdown::from_biosensors(readings).score
}

/// Time-domain heart rate variability over a run of RR intervals.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HrvMetrics {
    /// Mean RR interval in milliseconds.
    pub mean_rr: f64,
    /// Population standard deviation of the intervals (SDNN).
    pub sdnn: f64,
    /// Root mean square of successive differences (RMSSD).
    pub rmssd: f64,
    /// Intervals used after discarding non-finite and non-positive values.
    pub intervals: usize,
}

impl HrvMetrics {
    /// Computes mean RR, SDNN and RMSSD. `None` with fewer than two usable intervals.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_rr_intervals(intervals_ms: &[f64]) -> Option<Self> {
        let usable: Vec<f64> = intervals_ms
            .iter()
            .copied()
            .filter(|rr| rr.is_finite() && *rr > 0.0)
            .collect();
        if usable.len() < 2 {
            return None;
        }
        let count = usable.len() as f64;
        let mean_rr = usable.iter().sum::<f64>() / count;
        let variance = usable
            .iter()
            .map(|rr| (rr - mean_rr).powi(2))
            .sum::<f64>()
            / count;
        let successive = usable
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).powi(2))
            .sum::<f64>()
            / (count - 1.0);
        Some(Self {
            mean_rr,
            sdnn: variance.sqrt(),
            rmssd: successive.sqrt(),
            intervals: usable.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn time_domain_hrv_of_a_short_run() {
        let metrics = HrvMetrics::from_rr_intervals(&[800.0, 820.0, 790.0, 810.0]).unwrap();
        assert!((metrics.mean_rr - 805.0).abs() < 1e-9);
        assert!((metrics.sdnn - 125.0_f64.sqrt()).abs() < 1e-9);
        assert!((metrics.rmssd - (1700.0_f64 / 3.0).sqrt()).abs() < 1e-9);
        assert_eq!(metrics.intervals, 4);
    }

    #[test]
    fn unusable_intervals_are_skipped() {
        assert!(HrvMetrics::from_rr_intervals(&[]).is_none());
        assert!(HrvMetrics::from_rr_intervals(&[f64::NAN, 810.0, -5.0]).is_none());
        let steady = HrvMetrics::from_rr_intervals(&[1000.0, f64::INFINITY, 1000.0]).unwrap();
        assert!(steady.rmssd.abs() < f64::EPSILON);
        assert!(steady.sdnn.abs() < f64::EPSILON);
        assert_eq!(steady.intervals, 2);
    }

    #[test]
    fn reference_reading_is_moderate() {
        let breakdown = StressBreakdown::from_signals(90.0, 20.0, 8.0, 20.0);
        assert!((breakdown.heart_rate - 0.75).abs() < 1e-9);
        assert!((breakdown.hrv - 0.75).abs() < 1e-9);
        assert!((breakdown.skin_conductance - 0.30).abs() < 1e-9);
        assert!((breakdown.breathing - 0.80).abs() < 1e-9);
        assert!((breakdown.score - 0.6675).abs() < 1e-9);
        assert_eq!(breakdown.level(), StressLevel::Moderate);
        assert_eq!(
            breakdown.recommendation().map(|rec| rec.kind),
            Some("movement_break")
        );
    }

    #[test]
    fn level_boundaries_are_exclusive() {
        assert_eq!(StressLevel::from_score(0.7), StressLevel::Moderate);
        assert_eq!(StressLevel::from_score(0.700_001), StressLevel::High);
        assert_eq!(StressLevel::from_score(0.4), StressLevel::Low);
        assert_eq!(StressLevel::from_score(0.400_001), StressLevel::Moderate);
    }

    #[test]
    fn nan_inputs_are_guarded() {
        let breakdown = StressBreakdown::from_signals(f64::NAN, f64::NAN, f64::INFINITY, -1e300);
        assert!((0.0..=1.0).contains(&breakdown.score));
        assert!(breakdown.heart_rate.abs() < f64::EPSILON);
        assert!((breakdown.skin_conductance - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn default_readings_are_low() {
        let score = stress_score(&BiosensorReadings::default());
        assert_eq!(StressLevel::from_score(score), StressLevel::Low);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn score_and_subscores_in_unit_range(
            hr in -50.0f64..300.0,
            hrv in -50.0f64..300.0,
            sc in -20.0f64..100.0,
            br in -10.0f64..80.0,
        ) {
            let b = StressBreakdown::from_signals(hr, hrv, sc, br);
            for value in [b.heart_rate, b.hrv, b.skin_conductance, b.breathing, b.score] {
                prop_assert!((0.0..=1.0).contains(&value));
            }
        }

        #[test]
        fn monotone_in_heart_rate_and_breathing(
            hr in 30.0f64..200.0,
            hrv in 0.0f64..120.0,
            sc in 0.0f64..30.0,
            br in 5.0f64..40.0,
            bump in 0.0f64..50.0,
        ) {
            let base = StressBreakdown::from_signals(hr, hrv, sc, br).score;
            prop_assert!(StressBreakdown::from_signals(hr + bump, hrv, sc, br).score >= base - 1e-12);
            prop_assert!(StressBreakdown::from_signals(hr, hrv, sc, br + bump).score >= base - 1e-12);
        }

        #[test]
        fn non_increasing_in_hrv(
            hr in 30.0f64..200.0,
            hrv in 0.0f64..120.0,
            sc in 0.0f64..30.0,
            br in 5.0f64..40.0,
            bump in 0.0f64..50.0,
        ) {
            let base = StressBreakdown::from_signals(hr, hrv, sc, br).score;
            prop_assert!(StressBreakdown::from_signals(hr, hrv + bump, sc, br).score <= base + 1e-12);
        }
    }
}
