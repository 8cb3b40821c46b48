//! Proactive wellness: stress detection, movement breaks and hydration reminders.

/// Pure assessment formulas and stress pattern aggregation.
pub mod analysis;
/// Thresholds, cooldowns and loop periods.
pub mod config;
/// Sitting state machine, cooldown ledger and rolling stress window.
pub mod state;

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use shared_logging::LogLevel;
use sifiso_sensors::{HistoryWindow, SensorSnapshot, SensorStream, StressLevel};
use tracing::{debug, info, warn};

use crate::agent::{periodic, Agent, AgentCategory, AgentContext};
use crate::error::AgentError;
use crate::notification::{NotificationAction, NotificationIntent, NotificationPriority};

use self::analysis::{StressPattern, WellnessAnalysis};
use self::config::WellnessConfig;
use self::state::{InterventionKind, WellnessState};

/// Name and task namespace of the wellness agent.
pub const WELLNESS_AGENT_NAME: &str = "wellness";

const REQUIRED_PERMISSIONS: &[&str] = &[
    "body_sensors",
    "activity_recognition",
    "health_connect",
    "notifications",
];

/// Agent reacting to biosignals and posture with timed interventions.
pub struct WellnessAgent {
    context: AgentContext,
    config: WellnessConfig,
    stream: SensorStream,
    state: Mutex<WellnessState>,
}

impl std::fmt::Debug for WellnessAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WellnessAgent")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl WellnessAgent {
    /// Creates the agent over `stream`.
    #[must_use]
    pub fn new(context: AgentContext, stream: SensorStream, config: WellnessConfig) -> Self {
        Self {
            context,
            config,
            stream,
            state: Mutex::new(WellnessState::default()),
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &WellnessConfig {
        &self.config
    }

    /// Assesses `snapshot` against the tracked sitting state without recording it.
    #[must_use]
    pub fn analyze(&self, snapshot: &SensorSnapshot) -> WellnessAnalysis {
        self.state.lock().peek(snapshot, &self.config)
    }

    /// Analysis produced by the most recent snapshot, if any.
    #[must_use]
    pub fn latest_analysis(&self) -> Option<WellnessAnalysis> {
        self.state.lock().latest().cloned()
    }

    /// Stress readings aggregated over the trailing `window`.
    #[must_use]
    pub fn stress_pattern(&self, window: Duration) -> StressPattern {
        self.stress_pattern_at(Utc::now(), window)
    }

    /// Stress readings aggregated over `[now - window, now]`.
    #[must_use]
    pub fn stress_pattern_at(&self, now: DateTime<Utc>, window: Duration) -> StressPattern {
        let readings = self.state.lock().readings_within(now, window);
        StressPattern::from_readings(&readings, self.config.pattern_recent_readings)
    }

    /// Re-aggregates the stress window and records a decision when recent stress
    /// runs well above the window mean. Returns the pattern when one was reported.
    pub fn check_stress_pattern_at(&self, now: DateTime<Utc>) -> Option<StressPattern> {
        let pattern = self.stress_pattern_at(now, self.config.stress_window());
        if !pattern.is_escalating(self.config.pattern_ratio) {
            return None;
        }
        self.log_decision_with(
            "Stress pattern detected",
            &format!(
                "Recent stress {:.2} exceeds {:.1}x the {}h average {:.2}",
                pattern.recent_average,
                self.config.pattern_ratio,
                self.config.stress_window_hours,
                pattern.average
            ),
            pattern.recent_average,
            json!({
                "readings": pattern.readings,
                "peak_count": pattern.peak_count,
                "trend": pattern.trend,
            }),
        );
        Some(pattern)
    }

    /// Reads the trend window from sensor history and records it in telemetry.
    pub fn record_trend_at(&self, now: DateTime<Utc>) -> HistoryWindow {
        self.log_data_access("sensor_history", "Stress trend analysis");
        let window = self.stream.history_at(now, self.config.trend_window());
        let _ = self.context.telemetry().log(
            LogLevel::Info,
            "wellness.trend",
            json!({
                "snapshots": window.len(),
                "average_heart_rate": window.average_heart_rate(),
                "average_stress": window.average_stress(),
                "total_steps": window.total_steps(),
                "longest_sitting_minutes": window.longest_sitting_streak().num_minutes(),
            }),
        );
        window
    }

    /// On-demand stress assessment of the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Stopped`] once the agent has been stopped.
    pub fn stress_check(&self) -> Result<Value, AgentError> {
        if !self.is_running() {
            return Err(AgentError::Stopped(self.name().to_string()));
        }
        let snapshot = self.stream.current();
        self.log_data_access("biosensors", "On-demand stress check");
        let analysis = self.analyze(&snapshot);
        Ok(json!({
            "stress_score": analysis.stress.score,
            "stress_level": analysis.level.as_str(),
            "components": {
                "heart_rate": analysis.stress.heart_rate,
                "hrv": analysis.stress.hrv,
                "skin_conductance": analysis.stress.skin_conductance,
                "breathing": analysis.stress.breathing,
            },
            "recommendation": analysis.stress.recommendation(),
            "wellbeing_score": analysis.wellbeing_score,
            "requires_intervention": analysis.requires_intervention,
        }))
    }

    /// Breathing-break intervention requested from outside the snapshot path.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Stopped`] after stop, or a notification failure.
    pub async fn trigger_intervention(&self) -> Result<(), AgentError> {
        if !self.is_running() {
            return Err(AgentError::Stopped(self.name().to_string()));
        }
        let snapshot = self.stream.current();
        self.log_data_access("biosensors", "Requested wellness intervention");
        let analysis = self.analyze(&snapshot);
        self.log_decision_with(
            "Trigger breathing break",
            "Wellness intervention routine requested",
            1.0,
            json!({ "stress_score": analysis.stress.score }),
        );
        self.state
            .lock()
            .record_intervention(InterventionKind::Stress, Utc::now());
        self.context
            .notifier()
            .notify(self.intent(InterventionKind::Stress, &analysis))
            .await
    }

    /// Logs the decision for `kind`, marks it fired, then delivers the notification.
    async fn intervene(
        &self,
        kind: InterventionKind,
        analysis: &WellnessAnalysis,
    ) -> Result<(), AgentError> {
        self.log_intervention(kind, analysis);
        self.state
            .lock()
            .record_intervention(kind, analysis.timestamp);
        self.context
            .notifier()
            .notify(self.intent(kind, analysis))
            .await
    }

    fn log_intervention(&self, kind: InterventionKind, analysis: &WellnessAnalysis) {
        let (decision, reasoning, confidence) = match kind {
            InterventionKind::Stress => (
                "Trigger breathing break",
                format!(
                    "Stress score {:.2} is {}",
                    analysis.stress.score,
                    analysis.level.as_str()
                ),
                analysis.stress.score,
            ),
            InterventionKind::Sitting => (
                "Suggest movement break",
                format!(
                    "Sitting for {} minutes exceeds the {} minute threshold",
                    analysis.sitting_minutes, self.config.sitting_threshold_minutes
                ),
                0.9,
            ),
            InterventionKind::Hydration => (
                "Remind hydration",
                format!(
                    "Hydration {:.2} is below {:.2}",
                    analysis.hydration_level, self.config.hydration_threshold
                ),
                1.0 - analysis.hydration_level,
            ),
        };
        self.log_decision_with(
            decision,
            &reasoning,
            confidence,
            json!({ "intervention": kind.as_str() }),
        );
    }

    fn intent(&self, kind: InterventionKind, analysis: &WellnessAnalysis) -> NotificationIntent {
        let (title, message, priority) = match kind {
            InterventionKind::Stress => (
                "Take a Breathing Break".to_string(),
                "Your stress levels are elevated. A 5-minute breathing exercise can help."
                    .to_string(),
                NotificationPriority::High,
            ),
            InterventionKind::Sitting => (
                "Movement Reminder".to_string(),
                format!(
                    "You've been sitting for {} minutes. Consider a 5-minute walk to boost circulation.",
                    analysis.sitting_minutes
                ),
                NotificationPriority::Normal,
            ),
            InterventionKind::Hydration => (
                "Hydration Reminder".to_string(),
                "Your hydration levels are low. Time for some water!".to_string(),
                NotificationPriority::Low,
            ),
        };
        NotificationIntent::new(self.name(), kind.as_str(), title, message)
            .with_priority(priority)
            .with_actions(NotificationAction::standard())
            .with_data(json!({
                "stress_score": analysis.stress.score,
                "stress_level": analysis.level.as_str(),
                "sitting_minutes": analysis.sitting_minutes,
                "hydration_level": analysis.hydration_level,
                "wellbeing_score": analysis.wellbeing_score,
            }))
    }
}

#[async_trait]
impl Agent for WellnessAgent {
    fn name(&self) -> &str {
        WELLNESS_AGENT_NAME
    }

    fn category(&self) -> AgentCategory {
        AgentCategory::Wellness
    }

    fn required_permissions(&self) -> &'static [&'static str] {
        REQUIRED_PERMISSIONS
    }

    fn context(&self) -> &AgentContext {
        &self.context
    }

    async fn on_sensor_data(&self, snapshot: Arc<SensorSnapshot>) -> Result<(), AgentError> {
        if !self.is_running() {
            return Ok(());
        }
        self.log_data_access("biosensors", "Real-time wellness monitoring");
        let (analysis, due) = {
            let mut state = self.state.lock();
            let analysis = state.observe(&snapshot, &self.config);
            let due = state.due_interventions(&analysis, &self.config);
            (analysis, due)
        };
        if analysis.level == StressLevel::High {
            debug!(score = analysis.stress.score, "high stress reading");
        }
        let mut first_error = None;
        for kind in due {
            if let Err(err) = self.intervene(kind, &analysis).await {
                warn!(intervention = kind.as_str(), error = %err, "intervention not delivered");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn process(&self) -> Result<(), AgentError> {
        let stop = self.context.stop_token();
        let mut ticker = periodic(self.config.pattern_interval());
        info!(agent = self.name(), "wellness analysis loop started");
        loop {
            tokio::select! {
                biased;
                () = stop.cancelled() => break,
                _ = ticker.tick() => {
                    let now = Utc::now();
                    if let Some(pattern) = self.check_stress_pattern_at(now) {
                        info!(recent = pattern.recent_average, average = pattern.average, "stress pattern detected");
                    }
                    self.record_trend_at(now);
                }
            }
        }
        info!(agent = self.name(), "wellness analysis loop stopped");
        Ok(())
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sifiso_audit::{AuditFilter, AuditLog, LogType, Page};
    use sifiso_sensors::{ForcedState, Posture, SensorDelta, SensorStreamConfig};

    use crate::notification::Notifier;
    use crate::telemetry::RuntimeTelemetry;

    fn agent_with_bus() -> (
        Arc<WellnessAgent>,
        SensorStream,
        Arc<shared_event_bus::MemoryEventBus<NotificationIntent>>,
    ) {
        let stream = SensorStream::new(SensorStreamConfig::default().with_seed(7));
        let (notifier, bus) = Notifier::in_memory(64);
        let context = AgentContext::new(
            AuditLog::default(),
            notifier,
            RuntimeTelemetry::builder("wellness").memory_log().build().unwrap(),
        );
        let agent = Arc::new(WellnessAgent::new(
            context,
            stream.clone(),
            WellnessConfig::default(),
        ));
        (agent, stream, bus)
    }

    fn stressed() -> SensorDelta {
        SensorDelta::new()
            .heart_rate(105.0)
            .hrv(15.0)
            .skin_conductance(13.0)
            .breathing_rate(23.0)
    }

    #[tokio::test]
    async fn high_stress_logs_decision_before_notifying() {
        let (agent, stream, bus) = agent_with_bus();
        let snapshot = stream.update(&stressed()).unwrap();
        agent.on_sensor_data(snapshot).await.unwrap();

        let audit = agent.context().audit().all();
        assert_eq!(audit[0].log_type, LogType::DataAccess);
        assert_eq!(audit[1].log_type, LogType::AiDecision);
        assert_eq!(audit[1].message, "Trigger breathing break");
        let sent = bus.snapshot();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].title, "Take a Breathing Break");
        assert_eq!(sent[0].actions.len(), 3);
    }

    #[tokio::test]
    async fn sitting_break_fires_after_threshold() {
        let (agent, stream, bus) = agent_with_bus();
        let start = Utc::now();
        let sitting = SensorDelta::new().posture(Posture::Sitting);
        for minute in [0, 45, 91, 100] {
            let snapshot = stream
                .update_at(&sitting, start + Duration::minutes(minute))
                .unwrap();
            agent.on_sensor_data(snapshot).await.unwrap();
        }
        let titles: Vec<String> = bus.snapshot().into_iter().map(|i| i.title).collect();
        assert_eq!(titles, vec!["Movement Reminder".to_string()]);
        assert!(bus.snapshot()[0].message.contains("91 minutes"));
    }

    #[derive(Default)]
    struct FlakySink {
        attempts: Mutex<usize>,
        delivered: Mutex<Vec<NotificationIntent>>,
    }

    #[async_trait]
    impl shared_event_bus::EventPublisher<NotificationIntent> for FlakySink {
        async fn publish(&self, event: NotificationIntent) -> anyhow::Result<()> {
            let attempt = {
                let mut attempts = self.attempts.lock();
                *attempts += 1;
                *attempts
            };
            if attempt == 1 {
                anyhow::bail!("notification channel unavailable");
            }
            self.delivered.lock().push(event);
            Ok(())
        }
    }

    #[tokio::test]
    async fn failed_delivery_does_not_drop_other_interventions() {
        let stream = SensorStream::new(SensorStreamConfig::default().with_seed(7));
        let sink = Arc::new(FlakySink::default());
        let context = AgentContext::new(
            AuditLog::default(),
            Notifier::new(sink.clone()),
            RuntimeTelemetry::builder("wellness").memory_log().build().unwrap(),
        );
        let agent = WellnessAgent::new(context, stream.clone(), WellnessConfig::default());
        let start = Utc::now();

        let first = stream
            .update_at(&stressed().hydration(0.2), start)
            .unwrap();
        assert!(matches!(
            agent.on_sensor_data(first).await,
            Err(AgentError::Notification(_))
        ));
        let calm = SensorDelta::new()
            .heart_rate(62.0)
            .hrv(55.0)
            .skin_conductance(4.0)
            .breathing_rate(12.0)
            .hydration(0.2);
        let second = stream
            .update_at(&calm, start + Duration::minutes(5))
            .unwrap();
        agent.on_sensor_data(second).await.unwrap();

        let hydration_decisions = agent
            .context()
            .audit()
            .all()
            .iter()
            .filter(|entry| entry.message == "Remind hydration")
            .count();
        assert_eq!(hydration_decisions, 1);
        let delivered: Vec<String> = sink
            .delivered
            .lock()
            .iter()
            .map(|intent| intent.title.clone())
            .collect();
        assert_eq!(delivered, vec!["Hydration Reminder".to_string()]);
        let ledger_at = agent
            .state
            .lock()
            .ledger()
            .last(InterventionKind::Stress);
        assert_eq!(ledger_at, Some(start));
    }

    #[tokio::test]
    async fn sitting_break_fires_within_the_minute_it_is_due() {
        let (agent, stream, bus) = agent_with_bus();
        let start = Utc::now();
        let sitting = SensorDelta::new().posture(Posture::Sitting);
        for at in [start, start + Duration::minutes(90) + Duration::seconds(45)] {
            let snapshot = stream.update_at(&sitting, at).unwrap();
            agent.on_sensor_data(snapshot).await.unwrap();
        }
        let titles: Vec<String> = bus.snapshot().into_iter().map(|i| i.title).collect();
        assert_eq!(titles, vec!["Movement Reminder".to_string()]);
    }

    #[tokio::test]
    async fn stopped_agent_ignores_snapshots() {
        let (agent, stream, bus) = agent_with_bus();
        agent.stop();
        let snapshot = stream.update(&stressed()).unwrap();
        agent.on_sensor_data(snapshot).await.unwrap();
        assert!(bus.snapshot().is_empty());
        assert!(agent.context().audit().is_empty());
        assert!(agent.stress_check().is_err());
    }

    #[tokio::test]
    async fn escalating_pattern_is_logged_without_notification() {
        let (agent, stream, bus) = agent_with_bus();
        let start = Utc::now() - Duration::hours(2);
        {
            let mut state = agent.state.lock();
            for minute in 0..20 {
                let at = start + Duration::minutes(minute);
                state.observe(
                    &SensorSnapshot::initial(at).apply(
                        &SensorDelta::new().heart_rate(60.0).hrv(50.0).breathing_rate(12.0),
                        at,
                    ),
                    agent.config(),
                );
            }
        }
        for minute in 20..25 {
            let snapshot = stream
                .update_at(&stressed(), start + Duration::minutes(minute))
                .unwrap();
            agent.on_sensor_data(snapshot).await.unwrap();
        }
        let notified = bus.snapshot().len();
        let pattern = agent
            .check_stress_pattern_at(start + Duration::minutes(25))
            .unwrap();
        assert!(pattern.is_escalating(1.5));
        assert_eq!(bus.snapshot().len(), notified);
        let decisions = agent.context().audit().query(
            &AuditFilter::default().with_text("Stress pattern detected"),
            Page::default(),
        );
        assert_eq!(decisions.total, 1);
    }

    #[tokio::test]
    async fn stress_check_reports_current_level() {
        let (agent, stream, _bus) = agent_with_bus();
        stream.force_state(ForcedState::Stressed);
        stream.tick_once().unwrap();
        let report = agent.stress_check().unwrap();
        assert_eq!(report["stress_level"], "HIGH");
        assert!(report["recommendation"].is_object());
    }

    #[tokio::test]
    async fn triggered_intervention_notifies() {
        let (agent, _stream, bus) = agent_with_bus();
        agent.trigger_intervention().await.unwrap();
        assert_eq!(bus.snapshot()[0].category, "stress");
        let stats = agent.context().audit().stats();
        assert_eq!(stats.count(LogType::AiDecision), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn process_runs_until_stopped() {
        let (agent, _stream, _bus) = agent_with_bus();
        let runner = {
            let agent = Arc::clone(&agent);
            tokio::spawn(async move { agent.process().await })
        };
        tokio::time::sleep(std::time::Duration::from_secs(125)).await;
        agent.stop();
        runner.await.unwrap().unwrap();
        let trend_reads = agent
            .context()
            .telemetry()
            .records()
            .into_iter()
            .filter(|record| record.message == "wellness.trend")
            .count();
        assert_eq!(trend_reads, 2);
    }
}
