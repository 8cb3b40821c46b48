//! Mutable wellness state: sitting state machine, intervention cooldowns, stress window.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sifiso_sensors::{SensorSnapshot, StressBreakdown, StressLevel};

use super::analysis::{analyze_snapshot, StressReading, WellnessAnalysis};
use super::config::WellnessConfig;

/// Two-state posture machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SittingState {
    /// Not currently sitting.
    #[default]
    NotSitting,
    /// Sitting continuously since the given time.
    Sitting {
        /// Time the current sitting period started.
        since: DateTime<Utc>,
    },
}

/// Tracks continuous sitting duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SittingTracker {
    state: SittingState,
}

impl SittingTracker {
    /// Feeds one posture observation and returns the current sitting duration.
    pub fn observe(&mut self, sitting: bool, at: DateTime<Utc>) -> Duration {
        match (self.state, sitting) {
            (SittingState::NotSitting, true) => {
                self.state = SittingState::Sitting { since: at };
                Duration::zero()
            }
            (SittingState::Sitting { since }, true) => (at - since).max(Duration::zero()),
            (_, false) => {
                self.state = SittingState::NotSitting;
                Duration::zero()
            }
        }
    }

    /// Duration at `at` without changing state.
    #[must_use]
    pub fn duration_at(&self, at: DateTime<Utc>) -> Duration {
        match self.state {
            SittingState::Sitting { since } => (at - since).max(Duration::zero()),
            SittingState::NotSitting => Duration::zero(),
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SittingState {
        self.state
    }
}

/// Intervention types with independent cooldowns.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InterventionKind {
    /// Breathing break for HIGH stress.
    Stress,
    /// Movement break after prolonged sitting.
    Sitting,
    /// Hydration reminder.
    Hydration,
}

impl InterventionKind {
    /// Lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stress => "stress",
            Self::Sitting => "sitting",
            Self::Hydration => "hydration",
        }
    }
}

/// Last-fired timestamps per intervention kind.
#[derive(Debug, Clone, Default)]
pub struct InterventionLedger {
    last: HashMap<InterventionKind, DateTime<Utc>>,
}

impl InterventionLedger {
    /// Whether `kind` may fire at `at` given its cooldown (`None` never blocks).
    #[must_use]
    pub fn is_due(&self, kind: InterventionKind, at: DateTime<Utc>, cooldown: Option<Duration>) -> bool {
        match (self.last.get(&kind), cooldown) {
            (Some(last), Some(cooldown)) => at - *last >= cooldown,
            _ => true,
        }
    }

    /// Records that `kind` fired at `at`.
    pub fn record(&mut self, kind: InterventionKind, at: DateTime<Utc>) {
        self.last.insert(kind, at);
    }

    /// Last time `kind` fired.
    #[must_use]
    pub fn last(&self, kind: InterventionKind) -> Option<DateTime<Utc>> {
        self.last.get(&kind).copied()
    }
}

/// Everything the wellness agent mutates, guarded by one lock.
#[derive(Debug, Default)]
pub struct WellnessState {
    readings: VecDeque<StressReading>,
    sitting: SittingTracker,
    ledger: InterventionLedger,
    latest: Option<WellnessAnalysis>,
}

impl WellnessState {
    /// Updates sitting and stress history from `snapshot`, returning the analysis.
    pub fn observe(&mut self, snapshot: &SensorSnapshot, config: &WellnessConfig) -> WellnessAnalysis {
        let at = snapshot.timestamp;
        let sitting = self.sitting.observe(snapshot.is_sitting(), at);
        let breakdown = StressBreakdown::from_biosensors(&snapshot.biosensors);
        self.readings
            .push_back(StressReading::from_snapshot(snapshot, &breakdown));
        let cutoff = at - config.stress_window();
        while self
            .readings
            .front()
            .is_some_and(|reading| reading.timestamp < cutoff)
        {
            self.readings.pop_front();
        }
        let analysis = analyze_snapshot(snapshot, sitting, config);
        self.latest = Some(analysis.clone());
        analysis
    }

    /// Analysis of `snapshot` without recording it.
    #[must_use]
    pub fn peek(&self, snapshot: &SensorSnapshot, config: &WellnessConfig) -> WellnessAnalysis {
        analyze_snapshot(
            snapshot,
            self.sitting.duration_at(snapshot.timestamp),
            config,
        )
    }

    /// Interventions whose trigger and cooldown are both satisfied.
    ///
    /// Nothing is marked as fired here; callers record each kind with
    /// [`Self::record_intervention`] once its decision has been logged.
    #[must_use]
    pub fn due_interventions(
        &self,
        analysis: &WellnessAnalysis,
        config: &WellnessConfig,
    ) -> Vec<InterventionKind> {
        let at = analysis.timestamp;
        let mut due = Vec::new();
        if analysis.level == StressLevel::High
            && self
                .ledger
                .is_due(InterventionKind::Stress, at, config.stress_cooldown())
        {
            due.push(InterventionKind::Stress);
        }
        if Duration::seconds(analysis.sitting_seconds) > config.sitting_threshold()
            && self
                .ledger
                .is_due(InterventionKind::Sitting, at, Some(config.sitting_cooldown()))
        {
            due.push(InterventionKind::Sitting);
        }
        if analysis.hydration_level < config.hydration_threshold
            && self.ledger.is_due(
                InterventionKind::Hydration,
                at,
                Some(config.hydration_interval()),
            )
        {
            due.push(InterventionKind::Hydration);
        }
        due
    }

    /// Marks `kind` as fired at `at`.
    pub fn record_intervention(&mut self, kind: InterventionKind, at: DateTime<Utc>) {
        self.ledger.record(kind, at);
    }

    /// Stress readings within `[now - window, now]`, oldest first.
    #[must_use]
    pub fn readings_within(&self, now: DateTime<Utc>, window: Duration) -> Vec<StressReading> {
        let start = now - window;
        self.readings
            .iter()
            .filter(|reading| reading.timestamp >= start && reading.timestamp <= now)
            .copied()
            .collect()
    }

    /// Number of retained stress readings.
    #[must_use]
    pub fn reading_count(&self) -> usize {
        self.readings.len()
    }

    /// Sitting tracker.
    #[must_use]
    pub const fn sitting(&self) -> &SittingTracker {
        &self.sitting
    }

    /// Intervention ledger.
    #[must_use]
    pub const fn ledger(&self) -> &InterventionLedger {
        &self.ledger
    }

    /// Most recent analysis.
    #[must_use]
    pub const fn latest(&self) -> Option<&WellnessAnalysis> {
        self.latest.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sifiso_sensors::{Posture, SensorDelta};

    fn snapshot(at: DateTime<Utc>, delta: &SensorDelta) -> SensorSnapshot {
        SensorSnapshot::initial(at).apply(delta, at)
    }

    fn fire(
        state: &mut WellnessState,
        analysis: &WellnessAnalysis,
        config: &WellnessConfig,
    ) -> Vec<InterventionKind> {
        let due = state.due_interventions(analysis, config);
        for kind in &due {
            state.record_intervention(*kind, analysis.timestamp);
        }
        due
    }

    #[test]
    fn sitting_machine_resets_on_stand() {
        let start = Utc::now();
        let mut tracker = SittingTracker::default();
        assert_eq!(tracker.observe(true, start), Duration::zero());
        assert_eq!(
            tracker.observe(true, start + Duration::minutes(40)),
            Duration::minutes(40)
        );
        assert_eq!(
            tracker.observe(false, start + Duration::minutes(41)),
            Duration::zero()
        );
        assert_eq!(tracker.state(), SittingState::NotSitting);
        tracker.observe(true, start + Duration::minutes(50));
        assert_eq!(
            tracker.duration_at(start + Duration::minutes(55)),
            Duration::minutes(5)
        );
    }

    #[test]
    fn sitting_break_respects_cooldown() {
        let config = WellnessConfig::default();
        let mut state = WellnessState::default();
        let sitting = SensorDelta::new().posture(Posture::Sitting).hydration(0.8);
        let start = Utc::now();
        let mut fired = Vec::new();
        // One observation per minute for three hours of continuous sitting.
        for minute in 0..=180 {
            let at = start + Duration::minutes(minute);
            let analysis = state.observe(&snapshot(at, &sitting), &config);
            if fire(&mut state, &analysis, &config).contains(&InterventionKind::Sitting)
            {
                fired.push(minute);
            }
        }
        assert_eq!(fired, vec![91, 121, 151]);
    }

    #[test]
    fn sitting_break_counts_partial_minutes() {
        let config = WellnessConfig::default();
        let mut state = WellnessState::default();
        let sitting = SensorDelta::new().posture(Posture::Sitting).hydration(0.8);
        let start = Utc::now();
        state.observe(&snapshot(start, &sitting), &config);
        let at = start + Duration::minutes(90) + Duration::seconds(45);
        let analysis = state.observe(&snapshot(at, &sitting), &config);
        assert_eq!(analysis.sitting_minutes, 90);
        assert_eq!(
            state.due_interventions(&analysis, &config),
            vec![InterventionKind::Sitting]
        );
    }

    #[test]
    fn due_interventions_leave_ledger_untouched() {
        let config = WellnessConfig::default();
        let mut state = WellnessState::default();
        let at = Utc::now();
        let analysis = state.observe(&snapshot(at, &SensorDelta::new().hydration(0.2)), &config);
        assert!(state.due_interventions(&analysis, &config).contains(&InterventionKind::Hydration));
        assert!(state.ledger().last(InterventionKind::Hydration).is_none());
        assert!(state.due_interventions(&analysis, &config).contains(&InterventionKind::Hydration));
        state.record_intervention(InterventionKind::Hydration, at);
        assert!(!state.due_interventions(&analysis, &config).contains(&InterventionKind::Hydration));
    }

    #[test]
    fn hydration_reminder_waits_for_interval() {
        let config = WellnessConfig::default();
        let mut state = WellnessState::default();
        let dry = SensorDelta::new().hydration(0.2).posture(Posture::Standing);
        let start = Utc::now();
        let mut fired = 0;
        for minute in (0..=240).step_by(10) {
            let at = start + Duration::minutes(minute);
            let analysis = state.observe(&snapshot(at, &dry), &config);
            fired += fire(&mut state, &analysis, &config)
                .iter()
                .filter(|kind| **kind == InterventionKind::Hydration)
                .count();
        }
        assert_eq!(fired, 3);
    }

    #[test]
    fn high_stress_fires_every_time_without_cooldown() {
        let config = WellnessConfig::default();
        let mut state = WellnessState::default();
        let stressed = SensorDelta::new()
            .heart_rate(105.0)
            .hrv(15.0)
            .skin_conductance(13.0)
            .breathing_rate(23.0);
        let start = Utc::now();
        for second in 0..3 {
            let analysis = state.observe(&snapshot(start + Duration::seconds(second), &stressed), &config);
            assert_eq!(analysis.level, StressLevel::High);
            assert_eq!(
                fire(&mut state, &analysis, &config),
                vec![InterventionKind::Stress]
            );
        }
    }

    #[test]
    fn optional_stress_cooldown_is_honoured() {
        let config = WellnessConfig {
            stress_cooldown_minutes: Some(10),
            ..WellnessConfig::default()
        };
        let mut state = WellnessState::default();
        let stressed = SensorDelta::new()
            .heart_rate(105.0)
            .hrv(15.0)
            .skin_conductance(13.0)
            .breathing_rate(23.0);
        let start = Utc::now();
        let mut fired = 0;
        for minute in 0..25 {
            let analysis = state.observe(&snapshot(start + Duration::minutes(minute), &stressed), &config);
            fired += fire(&mut state, &analysis, &config).len();
        }
        assert_eq!(fired, 3);
    }

    #[test]
    fn stress_window_is_pruned() {
        let config = WellnessConfig::default();
        let mut state = WellnessState::default();
        let start = Utc::now() - Duration::hours(30);
        for hour in 0..=30 {
            state.observe(&snapshot(start + Duration::hours(hour), &SensorDelta::new()), &config);
        }
        assert_eq!(state.reading_count(), 25);
    }
}
