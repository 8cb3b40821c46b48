//! Synthetic biosignal generator used when no real hardware is attached.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Timelike, Utc};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::SensorError;
use crate::model::{LocationContext, Posture, SensorDelta};

/// Manual override applied to generated snapshots until replaced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ForcedState {
    /// No override; signals follow time of day.
    #[default]
    Normal,
    /// Elevated heart rate, suppressed HRV, high conductance. Always scores HIGH.
    Stressed,
    /// Resting signals. Always scores LOW.
    Calm,
    /// Sitting still with no steps.
    Sedentary,
    /// Hydration below the reminder threshold.
    Dehydrated,
    /// Walking with high motion intensity.
    Active,
}

impl ForcedState {
    /// Lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Stressed => "stressed",
            Self::Calm => "calm",
            Self::Sedentary => "sedentary",
            Self::Dehydrated => "dehydrated",
            Self::Active => "active",
        }
    }
}

impl fmt::Display for ForcedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForcedState {
    type Err = SensorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "normal" | "none" => Ok(Self::Normal),
            "stressed" | "stress" => Ok(Self::Stressed),
            "calm" => Ok(Self::Calm),
            "sedentary" | "sitting" => Ok(Self::Sedentary),
            "dehydrated" => Ok(Self::Dehydrated),
            "active" => Ok(Self::Active),
            other => Err(SensorError::UnknownState(other.to_string())),
        }
    }
}

struct Baseline {
    heart_rate: f64,
    hrv: f64,
    ambient_light: f64,
    location: LocationContext,
}

fn baseline_for(hour: u32) -> Baseline {
    let (heart_rate, hrv, ambient_light, location) = match hour {
        0..=5 => (58.0, 55.0, 5.0, LocationContext::Home),
        6..=8 => (66.0, 48.0, 250.0, LocationContext::Home),
        9..=11 => (72.0, 42.0, 450.0, LocationContext::Work),
        12..=13 => (70.0, 44.0, 500.0, LocationContext::Work),
        14..=17 => (74.0, 40.0, 420.0, LocationContext::Work),
        18..=21 => (68.0, 46.0, 150.0, LocationContext::Home),
        _ => (62.0, 52.0, 30.0, LocationContext::Home),
    };
    Baseline {
        heart_rate,
        hrv,
        ambient_light,
        location,
    }
}

/// Produces one full-reading delta per tick from time of day, override, and bounded jitter.
#[derive(Debug)]
pub struct SyntheticGenerator {
    rng: SmallRng,
    forced: ForcedState,
    recent_steps: VecDeque<(DateTime<Utc>, u32)>,
}

impl SyntheticGenerator {
    /// Creates a generator; a seed makes output reproducible.
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(SmallRng::from_entropy, SmallRng::seed_from_u64);
        Self {
            rng,
            forced: ForcedState::Normal,
            recent_steps: VecDeque::new(),
        }
    }

    /// Replaces the override; it applies from the next generated delta onward.
    pub fn force(&mut self, state: ForcedState) {
        self.forced = state;
    }

    /// Current override.
    #[must_use]
    pub const fn forced(&self) -> ForcedState {
        self.forced
    }

    /// Generates the readings for `now`.
    pub fn next_delta(&mut self, now: DateTime<Utc>) -> SensorDelta {
        let baseline = baseline_for(now.hour());
        let jitter = |rng: &mut SmallRng, spread: f64| rng.gen_range(-spread..=spread);

        let mut heart_rate = baseline.heart_rate + jitter(&mut self.rng, 4.0);
        let mut hrv = baseline.hrv + jitter(&mut self.rng, 5.0);
        let mut skin_conductance = self.rng.gen_range(3.5..=6.5);
        let mut breathing_rate = self.rng.gen_range(13.0..=17.0);
        let mut hydration = self.rng.gen_range(0.55..=0.8);
        let (mut posture, mut intensity, mut steps) = self.ambient_motion(now.hour());

        match self.forced {
            ForcedState::Normal => {}
            ForcedState::Stressed => {
                heart_rate = self.rng.gen_range(95.0..=110.0);
                hrv = self.rng.gen_range(12.0..=22.0);
                skin_conductance = self.rng.gen_range(11.0..=15.0);
                breathing_rate = self.rng.gen_range(20.0..=25.0);
            }
            ForcedState::Calm => {
                heart_rate = self.rng.gen_range(58.0..=64.0);
                hrv = self.rng.gen_range(55.0..=70.0);
                skin_conductance = self.rng.gen_range(2.0..=4.0);
                breathing_rate = self.rng.gen_range(10.0..=12.0);
            }
            ForcedState::Sedentary => {
                posture = Posture::Sitting;
                intensity = self.rng.gen_range(0.0..=0.05);
                steps = 0;
            }
            ForcedState::Dehydrated => {
                hydration = self.rng.gen_range(0.2..=0.35);
            }
            ForcedState::Active => {
                posture = Posture::Walking;
                intensity = self.rng.gen_range(0.6..=0.9);
                steps = self.rng.gen_range(1..=3);
                heart_rate = self.rng.gen_range(100.0..=120.0);
                hrv = self.rng.gen_range(40.0..=55.0);
                skin_conductance = self.rng.gen_range(4.0..=6.0);
                breathing_rate = self.rng.gen_range(16.0..=20.0);
            }
        }

        let steps_last_hour = self.record_steps(now, steps);
        let gravity = 9.81 + intensity * 2.0;
        SensorDelta::new()
            .heart_rate(heart_rate.max(30.0))
            .hrv(hrv.max(1.0))
            .skin_conductance(skin_conductance)
            .breathing_rate(breathing_rate)
            .hydration(hydration)
            .acceleration(
                jitter(&mut self.rng, intensity),
                jitter(&mut self.rng, intensity),
                gravity,
            )
            .motion_intensity(intensity)
            .posture(posture)
            .steps(steps, steps_last_hour)
            .ambient_light((baseline.ambient_light + jitter(&mut self.rng, 20.0)).max(0.0))
            .location(baseline.location)
    }

    fn ambient_motion(&mut self, hour: u32) -> (Posture, f64, u32) {
        if hour < 6 || hour >= 23 {
            return (Posture::Lying, self.rng.gen_range(0.0..=0.02), 0);
        }
        let roll: f64 = self.rng.gen();
        if roll < 0.6 {
            (Posture::Sitting, self.rng.gen_range(0.0..=0.1), 0)
        } else if roll < 0.85 {
            (Posture::Standing, self.rng.gen_range(0.05..=0.2), 0)
        } else {
            (
                Posture::Walking,
                self.rng.gen_range(0.4..=0.7),
                self.rng.gen_range(1..=2),
            )
        }
    }

    fn record_steps(&mut self, now: DateTime<Utc>, steps: u32) -> u32 {
        if steps > 0 {
            self.recent_steps.push_back((now, steps));
        }
        let cutoff = now - Duration::hours(1);
        while self
            .recent_steps
            .front()
            .is_some_and(|(ts, _)| *ts < cutoff)
        {
            self.recent_steps.pop_front();
        }
        self.recent_steps.iter().map(|(_, count)| *count).sum()
    }
}
