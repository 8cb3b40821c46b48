//! Bounded, time-windowed snapshot history.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::model::SensorSnapshot;
use crate::stress::stress_score;

/// Ordered snapshot history capped at `capacity` entries and pruned by age.
#[derive(Debug)]
pub struct SensorHistory {
    entries: VecDeque<Arc<SensorSnapshot>>,
    capacity: usize,
    max_age: Duration,
}

impl SensorHistory {
    /// Creates an empty history.
    #[must_use]
    pub fn new(capacity: usize, max_age: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            max_age,
        }
    }

    /// Appends a snapshot, evicting the oldest entries beyond the cap.
    pub fn push(&mut self, snapshot: Arc<SensorSnapshot>) {
        self.entries.push_back(snapshot);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Drops entries older than `now - max_age`.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.max_age;
        while self
            .entries
            .front()
            .is_some_and(|snapshot| snapshot.timestamp < cutoff)
        {
            self.entries.pop_front();
        }
    }

    /// Snapshots whose timestamp lies within `[now - duration, now]`, oldest first.
    #[must_use]
    pub fn window(&self, now: DateTime<Utc>, duration: Duration) -> HistoryWindow {
        let start = now - duration;
        let snapshots = self
            .entries
            .iter()
            .filter(|snapshot| snapshot.timestamp >= start && snapshot.timestamp <= now)
            .cloned()
            .collect();
        HistoryWindow { snapshots }
    }

    /// Number of retained snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the history is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured cap.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Snapshots returned by a history query, with aggregates computed on demand.
#[derive(Debug, Clone, Default)]
pub struct HistoryWindow {
    snapshots: Vec<Arc<SensorSnapshot>>,
}

impl HistoryWindow {
    /// Snapshots, oldest first.
    #[must_use]
    pub fn snapshots(&self) -> &[Arc<SensorSnapshot>] {
        &self.snapshots
    }

    /// Number of snapshots in the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Mean heart rate, if any snapshots are present.
    #[must_use]
    pub fn average_heart_rate(&self) -> Option<f64> {
        self.mean(|snapshot| snapshot.biosensors.heart_rate)
    }

    /// Mean fused stress score, if any snapshots are present.
    #[must_use]
    pub fn average_stress(&self) -> Option<f64> {
        self.mean(|snapshot| stress_score(&snapshot.biosensors))
    }

    /// Sum of per-snapshot step increments.
    #[must_use]
    pub fn total_steps(&self) -> u64 {
        self.snapshots
            .iter()
            .map(|snapshot| u64::from(snapshot.motion.steps))
            .sum()
    }

    /// Longest run of consecutive sitting snapshots, measured first-to-last timestamp.
    #[must_use]
    pub fn longest_sitting_streak(&self) -> Duration {
        let mut longest = Duration::zero();
        let mut streak_start: Option<DateTime<Utc>> = None;
        for snapshot in &self.snapshots {
            if snapshot.is_sitting() {
                let start = *streak_start.get_or_insert(snapshot.timestamp);
                longest = longest.max(snapshot.timestamp - start);
            } else {
                streak_start = None;
            }
        }
        longest
    }

    fn mean(&self, value: impl Fn(&SensorSnapshot) -> f64) -> Option<f64> {
        if self.snapshots.is_empty() {
            return None;
        }
        let total: f64 = self.snapshots.iter().map(|snapshot| value(snapshot)).sum();
        #[allow(clippy::cast_precision_loss)]
        Some(total / self.snapshots.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Posture, SensorDelta};

    fn snapshot_at(ts: DateTime<Utc>, delta: &SensorDelta) -> Arc<SensorSnapshot> {
        Arc::new(SensorSnapshot::initial(ts).apply(delta, ts))
    }

    #[test]
    fn never_exceeds_capacity() {
        let now = Utc::now();
        let mut history = SensorHistory::new(10, Duration::hours(1));
        for i in 0..25 {
            history.push(snapshot_at(now + Duration::seconds(i), &SensorDelta::new()));
            assert!(history.len() <= 10);
        }
        assert_eq!(history.len(), 10);
    }

    #[test]
    fn window_is_inclusive_of_bounds() {
        let now = Utc::now();
        let mut history = SensorHistory::new(100, Duration::hours(2));
        for minutes in [90, 30, 10, 0] {
            history.push(snapshot_at(
                now - Duration::minutes(minutes),
                &SensorDelta::new(),
            ));
        }
        let window = history.window(now, Duration::minutes(30));
        assert_eq!(window.len(), 3);
        assert!(window
            .snapshots()
            .iter()
            .all(|s| s.timestamp >= now - Duration::minutes(30) && s.timestamp <= now));
    }

    #[test]
    fn prune_drops_old_entries() {
        let now = Utc::now();
        let mut history = SensorHistory::new(100, Duration::minutes(5));
        history.push(snapshot_at(now - Duration::minutes(10), &SensorDelta::new()));
        history.push(snapshot_at(now, &SensorDelta::new()));
        history.prune(now);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn aggregates_are_computed_on_demand() {
        let now = Utc::now();
        let mut history = SensorHistory::new(100, Duration::hours(1));
        let sitting = SensorDelta::new().posture(Posture::Sitting);
        let walking = SensorDelta::new().posture(Posture::Walking).steps(50, 50);
        history.push(snapshot_at(now - Duration::minutes(20), &sitting.heart_rate(60.0)));
        history.push(snapshot_at(now - Duration::minutes(12), &sitting.heart_rate(80.0)));
        history.push(snapshot_at(now - Duration::minutes(10), &walking.heart_rate(100.0)));
        history.push(snapshot_at(now - Duration::minutes(5), &sitting.heart_rate(80.0)));

        let window = history.window(now, Duration::hours(1));
        assert_eq!(window.average_heart_rate(), Some(80.0));
        assert_eq!(window.total_steps(), 50);
        assert_eq!(window.longest_sitting_streak(), Duration::minutes(8));
        assert!(window.average_stress().is_some());
        assert!(HistoryWindow::default().average_stress().is_none());
    }
}
