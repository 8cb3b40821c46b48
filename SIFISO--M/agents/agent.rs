//! The agent contract and the shared handles every agent carries.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sifiso_audit::{AuditLog, LogEntry};
use sifiso_sensors::SensorSnapshot;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::AgentError;
use crate::notification::Notifier;
use crate::telemetry::RuntimeTelemetry;

/// Broad area an agent works in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentCategory {
    /// Physical and mental wellbeing.
    Wellness,
    /// Career development.
    Career,
    /// Anything else.
    General,
}

impl fmt::Display for AgentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Wellness => "wellness",
            Self::Career => "career",
            Self::General => "general",
        })
    }
}

/// Handles injected into an agent at construction: audit trail, notification sink,
/// telemetry, and the stop signal.
#[derive(Debug, Clone)]
pub struct AgentContext {
    audit: AuditLog,
    notifier: Notifier,
    telemetry: RuntimeTelemetry,
    stop: CancellationToken,
}

impl AgentContext {
    /// Creates a context with a fresh stop signal.
    #[must_use]
    pub fn new(audit: AuditLog, notifier: Notifier, telemetry: RuntimeTelemetry) -> Self {
        Self {
            audit,
            notifier,
            telemetry,
            stop: CancellationToken::new(),
        }
    }

    /// Context with an in-memory notifier and disabled telemetry.
    #[must_use]
    pub fn detached(audit: AuditLog) -> Self {
        let (notifier, _) = Notifier::in_memory(16);
        Self::new(audit, notifier, RuntimeTelemetry::disabled("agent"))
    }

    /// Audit trail.
    #[must_use]
    pub const fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Notification sink.
    #[must_use]
    pub const fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Operational telemetry.
    #[must_use]
    pub const fn telemetry(&self) -> &RuntimeTelemetry {
        &self.telemetry
    }

    /// Token cancelled when the agent stops.
    #[must_use]
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Signals the agent to stop. Idempotent.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Whether the agent was asked to stop.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }
}

/// A capability-scoped, independently scheduled unit of autonomy.
///
/// The orchestrator runs [`Agent::process`] on its own task and feeds snapshots to
/// [`Agent::on_sensor_data`] from a separate per-agent task, so neither can stall the
/// stream or another agent.
#[async_trait]
pub trait Agent: Send + Sync + 'static {
    /// Stable agent name; also the task namespace it owns.
    fn name(&self) -> &str;

    /// Category of the agent.
    fn category(&self) -> AgentCategory;

    /// Capability identifiers the agent needs. Empty for unrestricted agents.
    fn required_permissions(&self) -> &'static [&'static str] {
        &[]
    }

    /// Whether every required capability appears in `granted`.
    fn has_required_permissions(&self, granted: &[String]) -> bool {
        self.missing_permissions(granted).is_empty()
    }

    /// Required capabilities absent from `granted`.
    fn missing_permissions(&self, granted: &[String]) -> Vec<&'static str> {
        self.required_permissions()
            .iter()
            .copied()
            .filter(|required| !granted.iter().any(|grant| grant == required))
            .collect()
    }

    /// Injected handles.
    fn context(&self) -> &AgentContext;

    /// Reacts to one published snapshot. Must return promptly.
    async fn on_sensor_data(&self, snapshot: Arc<SensorSnapshot>) -> Result<(), AgentError>;

    /// Periodic, time-driven analysis. Returns once the agent is stopped.
    async fn process(&self) -> Result<(), AgentError>;

    /// Stops the agent: `process` returns and periodic timers are dropped. Idempotent.
    fn stop(&self) {
        self.context().stop();
    }

    /// Whether the agent has not been stopped.
    fn is_running(&self) -> bool {
        !self.context().is_stopped()
    }

    /// Records a read of personal data.
    fn log_data_access(&self, data_type: &str, purpose: &str) -> LogEntry {
        self.context()
            .audit()
            .data_access(self.name(), data_type, purpose)
    }

    /// Records an autonomous decision.
    fn log_decision(&self, decision: &str, reasoning: &str, confidence: f64) -> LogEntry {
        self.context()
            .audit()
            .decision(self.name(), decision, reasoning, confidence)
    }

    /// Records an autonomous decision with structured context.
    fn log_decision_with(
        &self,
        decision: &str,
        reasoning: &str,
        confidence: f64,
        context: Value,
    ) -> LogEntry {
        self.context()
            .audit()
            .decision_with(self.name(), decision, reasoning, confidence, context)
    }

    /// Upcast used by typed task handlers.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Periodic timer whose first tick fires one `period` from now.
#[must_use]
pub fn periodic(period: Duration) -> Interval {
    let period = period.max(Duration::from_millis(1));
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
