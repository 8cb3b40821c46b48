//! Pluggable real-sensor producers.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SensorError;
use crate::model::SensorEvent;

/// A producer of discrete sensor events, e.g. a hardware driver or a replay file.
#[async_trait]
pub trait SensorSource: Send {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Waits for the next event. `Ok(None)` means the source is exhausted.
    async fn next_event(&mut self) -> Result<Option<SensorEvent>, SensorError>;
}

/// Replays a fixed list of events, each after its own delay.
#[derive(Debug, Clone)]
pub struct ScriptedSensorSource {
    name: String,
    script: VecDeque<(Duration, SensorEvent)>,
}

impl ScriptedSensorSource {
    /// Creates an empty script.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: VecDeque::new(),
        }
    }

    /// Appends an event emitted `delay` after the previous one.
    #[must_use]
    pub fn then(mut self, delay: Duration, event: SensorEvent) -> Self {
        self.script.push_back((delay, event));
        self
    }

    /// Appends events emitted back to back.
    #[must_use]
    pub fn with_events(mut self, events: impl IntoIterator<Item = SensorEvent>) -> Self {
        self.script
            .extend(events.into_iter().map(|event| (Duration::ZERO, event)));
        self
    }

    /// Events still pending.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

#[async_trait]
impl SensorSource for ScriptedSensorSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_event(&mut self) -> Result<Option<SensorEvent>, SensorError> {
        let Some((delay, event)) = self.script.pop_front() else {
            return Ok(None);
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(Some(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn replays_in_order_then_exhausts() {
        let mut source = ScriptedSensorSource::new("replay")
            .then(Duration::from_secs(2), SensorEvent::HeartRate { bpm: 80.0 })
            .with_events([SensorEvent::Hydration { level: 0.3 }]);
        assert_eq!(source.remaining(), 2);
        assert_eq!(
            source.next_event().await.unwrap(),
            Some(SensorEvent::HeartRate { bpm: 80.0 })
        );
        assert_eq!(
            source.next_event().await.unwrap(),
            Some(SensorEvent::Hydration { level: 0.3 })
        );
        assert_eq!(source.next_event().await.unwrap(), None);
    }
}
