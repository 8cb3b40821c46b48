//! Bootstrap wiring stream, audit log, notification bus and both agents.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::json;
use shared_event_bus::{EventRecord, MemoryEventBus};
use sifiso_agents::{
    periodic, AgentContext, CareerAgent, NotificationIntent, Notifier, OpportunitySource,
    RuntimeTelemetry, TrendSource, WellnessAgent, CAREER_AGENT_NAME, WELLNESS_AGENT_NAME,
};
use sifiso_audit::AuditLog;
use sifiso_sensors::SensorStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::SifisoConfig;
use crate::error::OrchestratorError;
use crate::orchestrator::Orchestrator;
use crate::services::RoutineServices;

const BUS_CAPACITY: usize = 256;

/// Builder for [`SifisoRuntime`].
#[must_use]
pub struct SifisoRuntimeBuilder {
    config: SifisoConfig,
    log_dir: Option<PathBuf>,
    synthetic: bool,
    services: Option<Arc<dyn RoutineServices>>,
    trend_source: Option<Arc<dyn TrendSource>>,
    opportunity_source: Option<Arc<dyn OpportunitySource>>,
}

impl SifisoRuntimeBuilder {
    /// Writes operational JSON-lines logs under `dir` instead of keeping them in memory.
    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Starts the synthetic generator once built.
    pub const fn synthetic(mut self, enabled: bool) -> Self {
        self.synthetic = enabled;
        self
    }

    /// Replaces the simulated routine collaborators.
    pub fn services(mut self, services: Arc<dyn RoutineServices>) -> Self {
        self.services = Some(services);
        self
    }

    /// Replaces the career trend catalogue.
    pub fn trend_source(mut self, source: Arc<dyn TrendSource>) -> Self {
        self.trend_source = Some(source);
        self
    }

    /// Replaces the career job search.
    pub fn opportunity_source(mut self, source: Arc<dyn OpportunitySource>) -> Self {
        self.opportunity_source = Some(source);
        self
    }

    /// Validates the configuration, wires every component and registers both agents.
    /// Must run inside a tokio runtime.
    pub fn build(self) -> Result<SifisoRuntime> {
        let config = self.config;
        config
            .validate()
            .map_err(|err| OrchestratorError::InvalidConfig(format!("{err:#}")))?;

        let events = Arc::new(MemoryEventBus::<EventRecord>::new(BUS_CAPACITY));
        let telemetry = match &self.log_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("creating log dir {}", dir.display()))?;
                RuntimeTelemetry::builder("sifiso")
                    .log_path(dir.join("sifiso.log.jsonl"))
                    .event_publisher(events.clone())
                    .build()?
            }
            None => RuntimeTelemetry::builder("sifiso")
                .memory_log()
                .event_publisher(events.clone())
                .build()?,
        };

        let stream = SensorStream::new(config.sensors.clone());
        let audit = AuditLog::new(config.audit.clone());
        let (notifier, notifications) = Notifier::in_memory(BUS_CAPACITY);

        let wellness = Arc::new(WellnessAgent::new(
            AgentContext::new(audit.clone(), notifier.clone(), telemetry.scoped("wellness")),
            stream.clone(),
            config.wellness.clone(),
        ));
        let mut career = CareerAgent::new(
            AgentContext::new(audit.clone(), notifier.clone(), telemetry.scoped("career")),
            config.career.profile.clone(),
            config.career.agent.clone(),
        );
        if let Some(source) = self.trend_source {
            career = career.with_trend_source(source);
        }
        if let Some(source) = self.opportunity_source {
            career = career.with_opportunity_source(source);
        }
        let career = Arc::new(career);

        let mut orchestrator = Orchestrator::builder(audit.clone(), stream.clone())
            .notifier(notifier)
            .telemetry(telemetry.scoped("orchestrator"))
            .config(config.orchestrator.clone())
            .granted_permissions(config.permissions.granted.iter().cloned());
        if let Some(services) = self.services {
            orchestrator = orchestrator.services(services);
        }
        let orchestrator = orchestrator.build();
        orchestrator.register(WELLNESS_AGENT_NAME, wellness.clone())?;
        orchestrator.register(CAREER_AGENT_NAME, career.clone())?;

        let retention_stop = CancellationToken::new();
        let retention = config.audit.retention_days.map(|days| {
            info!(days, "audit retention enabled");
            tokio::spawn(retention_loop(
                audit.clone(),
                config.audit.retention_interval(),
                retention_stop.clone(),
                telemetry.scoped("audit"),
                Utc::now,
            ))
        });

        if self.synthetic {
            stream.start();
        }
        info!(
            agents = ?orchestrator.agent_types(),
            synthetic = self.synthetic,
            "sifiso runtime started"
        );
        Ok(SifisoRuntime {
            config,
            stream,
            audit,
            orchestrator,
            wellness,
            career,
            telemetry,
            notifications,
            events,
            retention_stop,
            retention: Mutex::new(retention),
        })
    }
}

/// Applies audit retention every `period` until `stop` fires.
async fn retention_loop<C>(
    audit: AuditLog,
    period: std::time::Duration,
    stop: CancellationToken,
    telemetry: RuntimeTelemetry,
    clock: C,
) where
    C: Fn() -> DateTime<Utc> + Send + 'static,
{
    let mut ticker = periodic(period);
    loop {
        tokio::select! {
            biased;
            () = stop.cancelled() => break,
            _ = ticker.tick() => {
                let purged = audit.apply_retention(clock());
                if purged > 0 {
                    let _ = telemetry.event("audit.retention.applied", json!({ "purged": purged }));
                }
            }
        }
    }
}

/// A running stream, audit log, orchestrator and the two built-in agents.
pub struct SifisoRuntime {
    config: SifisoConfig,
    stream: SensorStream,
    audit: AuditLog,
    orchestrator: Orchestrator,
    wellness: Arc<WellnessAgent>,
    career: Arc<CareerAgent>,
    telemetry: RuntimeTelemetry,
    notifications: Arc<MemoryEventBus<NotificationIntent>>,
    events: Arc<MemoryEventBus<EventRecord>>,
    retention_stop: CancellationToken,
    retention: Mutex<Option<JoinHandle<()>>>,
}

impl SifisoRuntime {
    /// Starts a builder.
    pub fn builder(config: SifisoConfig) -> SifisoRuntimeBuilder {
        SifisoRuntimeBuilder {
            config,
            log_dir: None,
            synthetic: false,
            services: None,
            trend_source: None,
            opportunity_source: None,
        }
    }

    /// Effective configuration.
    #[must_use]
    pub const fn config(&self) -> &SifisoConfig {
        &self.config
    }

    /// Sensor stream.
    #[must_use]
    pub const fn stream(&self) -> &SensorStream {
        &self.stream
    }

    /// Audit log.
    #[must_use]
    pub const fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Orchestrator.
    #[must_use]
    pub const fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Wellness agent.
    #[must_use]
    pub const fn wellness(&self) -> &Arc<WellnessAgent> {
        &self.wellness
    }

    /// Career agent.
    #[must_use]
    pub const fn career(&self) -> &Arc<CareerAgent> {
        &self.career
    }

    /// Operational telemetry root.
    #[must_use]
    pub const fn telemetry(&self) -> &RuntimeTelemetry {
        &self.telemetry
    }

    /// Bus carrying notification intents to the UI.
    #[must_use]
    pub const fn notification_bus(&self) -> &Arc<MemoryEventBus<NotificationIntent>> {
        &self.notifications
    }

    /// Recent notification intents, oldest first.
    #[must_use]
    pub fn notifications(&self) -> Vec<NotificationIntent> {
        self.notifications.snapshot()
    }

    /// Recent lifecycle events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<EventRecord> {
        self.events.snapshot()
    }

    /// Whether the periodic audit retention task is still running.
    #[must_use]
    pub fn retention_active(&self) -> bool {
        self.retention
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops agents, the retention task and then the stream.
    pub async fn shutdown(&self) {
        self.orchestrator.shutdown().await;
        self.retention_stop.cancel();
        let retention = self.retention.lock().take();
        if let Some(handle) = retention {
            if let Err(err) = handle.await {
                warn!(error = %err, "audit retention task ended abnormally");
            }
        }
        self.stream.shutdown();
        info!("sifiso runtime stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::AgentStatus;
    use sifiso_agents::agent::Agent;

    #[tokio::test]
    async fn builds_and_registers_both_agents() {
        let runtime = SifisoRuntime::builder(SifisoConfig::default())
            .build()
            .unwrap();
        assert_eq!(
            runtime.orchestrator().agent_types(),
            vec![WELLNESS_AGENT_NAME.to_string(), CAREER_AGENT_NAME.to_string()]
        );
        assert!(runtime.wellness().is_running());
        assert!(runtime.career().is_running());
        runtime.shutdown().await;
        assert!(runtime.stream().is_closed());
        assert_eq!(
            runtime.orchestrator().agent_status(WELLNESS_AGENT_NAME),
            Some(AgentStatus::Stopped)
        );
        assert!(!runtime.career().is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn retention_purges_on_each_period_until_cancelled() {
        let audit = AuditLog::new(sifiso_audit::AuditConfig {
            retention_days: Some(1),
            ..sifiso_audit::AuditConfig::default()
        });
        let now = Arc::new(Mutex::new(Utc::now()));
        let stop = CancellationToken::new();
        let task = {
            let now = Arc::clone(&now);
            tokio::spawn(retention_loop(
                audit.clone(),
                std::time::Duration::from_secs(60),
                stop.clone(),
                RuntimeTelemetry::disabled("audit"),
                move || *now.lock(),
            ))
        };
        audit.system_event("runtime", "started", serde_json::Value::Null);

        tokio::time::sleep(std::time::Duration::from_secs(61)).await;
        assert_eq!(audit.len(), 1);

        *now.lock() = Utc::now() + chrono::Duration::days(2);
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        assert_eq!(audit.len(), 1);
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        assert!(audit.is_empty());

        stop.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn retention_task_follows_runtime_lifecycle() {
        let mut config = SifisoConfig::default();
        config.audit.retention_days = Some(30);
        config.audit.retention_interval_secs = 5;
        let runtime = SifisoRuntime::builder(config).build().unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(12)).await;
        assert!(runtime.retention_active());
        tokio::time::timeout(std::time::Duration::from_secs(5), runtime.shutdown())
            .await
            .unwrap();
        assert!(!runtime.retention_active());

        let plain = SifisoRuntime::builder(SifisoConfig::default())
            .build()
            .unwrap();
        assert!(!plain.retention_active());
        plain.shutdown().await;
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let mut config = SifisoConfig::default();
        config.sensors.subscriber_buffer = 0;
        let err = SifisoRuntime::builder(config).build().err().unwrap();
        assert!(err.to_string().contains("invalid configuration"));
    }

    #[tokio::test]
    async fn file_logs_land_in_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = SifisoRuntime::builder(SifisoConfig::default())
            .log_dir(dir.path())
            .build()
            .unwrap();
        runtime
            .orchestrator()
            .orchestrate_routine("morning_routine", serde_json::Value::Null)
            .await;
        runtime.shutdown().await;
        let raw = std::fs::read_to_string(dir.path().join("sifiso.log.jsonl")).unwrap();
        assert!(raw.contains("orchestrator.routine"));
    }
}
