//! Agent supervision, task dispatch and routine execution.

use std::cmp::Reverse;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sifiso_agents::{
    Agent, AgentError, CareerAgent, NotificationIntent, Notifier, RuntimeTelemetry,
    WellnessAgent, WELLNESS_AGENT_NAME,
};
use sifiso_audit::AuditLog;
use sifiso_sensors::{SensorStream, SensorSubscription};
use shared_logging::LogLevel;
use tokio::runtime::Handle;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::OrchestratorError;
use crate::handlers::{handler_table, TaskHandler};
use crate::routines::{
    morning_routine, panic_message, travel_disruption, RoutineKind, RoutineResult,
};
use crate::services::{RoutineServices, SimulatedRoutineServices};
use crate::task::{AgentTask, TaskStatus};

/// Namespace of tasks the orchestrator handles itself.
pub const ROUTINE_NAMESPACE: &str = "routine";

const AUDIT_SOURCE: &str = "orchestrator";

/// Supervision state of a registered agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum AgentStatus {
    /// `process` is running.
    Running,
    /// `process` returned after stop.
    Stopped,
    /// `process` returned an error or panicked. Not restarted.
    Failed(String),
}

/// Orchestrator tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// How long shutdown waits for each agent loop before aborting it.
    pub shutdown_grace_ms: u64,
    /// Whether routine summaries are pushed as notifications.
    pub notify_routine_results: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            shutdown_grace_ms: 2_000,
            notify_routine_results: true,
        }
    }
}

impl OrchestratorConfig {
    /// Grace period as a duration.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Builder for [`Orchestrator`].
#[must_use]
pub struct OrchestratorBuilder {
    audit: AuditLog,
    stream: SensorStream,
    notifier: Option<Notifier>,
    telemetry: Option<RuntimeTelemetry>,
    services: Arc<dyn RoutineServices>,
    config: OrchestratorConfig,
    granted: Vec<String>,
}

impl OrchestratorBuilder {
    /// Notification sink for routine results.
    pub fn notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Operational telemetry.
    pub fn telemetry(mut self, telemetry: RuntimeTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Routine collaborators.
    pub fn services(mut self, services: Arc<dyn RoutineServices>) -> Self {
        self.services = services;
        self
    }

    /// Tuning.
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Capabilities granted to agents.
    pub fn granted_permissions<I, S>(mut self, granted: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.granted = granted.into_iter().map(Into::into).collect();
        self
    }

    /// Builds the orchestrator.
    #[must_use]
    pub fn build(self) -> Orchestrator {
        let notifier = self
            .notifier
            .unwrap_or_else(|| Notifier::in_memory(64).0);
        Orchestrator {
            inner: Arc::new(OrchestratorInner {
                audit: self.audit,
                stream: self.stream,
                notifier,
                telemetry: self
                    .telemetry
                    .unwrap_or_else(|| RuntimeTelemetry::disabled(AUDIT_SOURCE)),
                services: self.services,
                config: self.config,
                granted: self.granted,
                handlers: handler_table(),
                agents: RwLock::new(IndexMap::new()),
                shutdown: CancellationToken::new(),
            }),
        }
    }
}

struct RegisteredAgent {
    agent: Arc<dyn Agent>,
    status: Arc<Mutex<AgentStatus>>,
    runner: Option<AbortHandle>,
    supervisor: Option<JoinHandle<()>>,
    pump: Option<JoinHandle<()>>,
}

struct OrchestratorInner {
    audit: AuditLog,
    stream: SensorStream,
    notifier: Notifier,
    telemetry: RuntimeTelemetry,
    services: Arc<dyn RoutineServices>,
    config: OrchestratorConfig,
    granted: Vec<String>,
    handlers: IndexMap<&'static str, TaskHandler>,
    agents: RwLock<IndexMap<String, RegisteredAgent>>,
    shutdown: CancellationToken,
}

/// Owns registered agents, runs each on its own supervised tasks, dispatches tasks,
/// and runs routines. Cloning shares the same orchestrator.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("agents", &self.agent_types())
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Starts a builder over the shared audit log and sensor stream.
    pub fn builder(audit: AuditLog, stream: SensorStream) -> OrchestratorBuilder {
        OrchestratorBuilder {
            audit,
            stream,
            notifier: None,
            telemetry: None,
            services: Arc::new(SimulatedRoutineServices),
            config: OrchestratorConfig::default(),
            granted: Vec::new(),
        }
    }

    /// Audit trail.
    #[must_use]
    pub fn audit(&self) -> &AuditLog {
        &self.inner.audit
    }

    /// Sensor stream feeding the agents.
    #[must_use]
    pub fn stream(&self) -> &SensorStream {
        &self.inner.stream
    }

    /// Whether [`Self::shutdown`] was called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Registers `agent` under `agent_type` and starts its loop and snapshot pump.
    ///
    /// Missing permissions are recorded as a privacy event; registration still
    /// proceeds.
    ///
    /// # Errors
    ///
    /// Fails after shutdown, for a duplicate type, or outside a tokio runtime.
    #[instrument(skip_all, fields(agent = %agent.name()))]
    pub fn register(
        &self,
        agent_type: impl Into<String>,
        agent: Arc<dyn Agent>,
    ) -> Result<(), OrchestratorError> {
        let agent_type = agent_type.into();
        if self.is_shut_down() {
            return Err(OrchestratorError::ShutDown);
        }
        let handle = Handle::try_current()
            .map_err(|_| OrchestratorError::NoRuntime(agent_type.clone()))?;
        let mut agents = self.inner.agents.write();
        if agents.contains_key(&agent_type) {
            return Err(OrchestratorError::DuplicateAgent(agent_type));
        }

        let missing = agent.missing_permissions(&self.inner.granted);
        if !missing.is_empty() {
            warn!(agent = %agent_type, ?missing, "agent registered without required permissions");
            self.inner.audit.privacy_event(
                agent.name(),
                format!("Missing permissions: {}", missing.join(", ")),
                json!({ "agent_type": agent_type, "missing": missing }),
            );
        }

        let status = Arc::new(Mutex::new(AgentStatus::Running));
        let subscription = self.inner.stream.subscribe();
        let runner = {
            let agent = Arc::clone(&agent);
            handle.spawn(async move { agent.process().await })
        };
        let runner_abort = runner.abort_handle();
        let supervisor = handle.spawn(supervise(
            runner,
            agent_type.clone(),
            Arc::clone(&status),
            self.inner.audit.clone(),
            self.inner.telemetry.clone(),
        ));
        let pump = handle.spawn(pump_snapshots(
            Arc::clone(&agent),
            agent_type.clone(),
            subscription,
            self.inner.audit.clone(),
            self.inner.shutdown.clone(),
        ));

        self.inner.audit.system_event(
            AUDIT_SOURCE,
            format!("Registered agent {agent_type}"),
            json!({
                "agent_type": agent_type,
                "name": agent.name(),
                "category": agent.category().to_string(),
            }),
        );
        let _ = self.inner.telemetry.event(
            "orchestrator.agent.registered",
            json!({ "agent_type": agent_type, "name": agent.name() }),
        );
        info!(agent = %agent_type, "agent registered");
        agents.insert(
            agent_type,
            RegisteredAgent {
                agent,
                status,
                runner: Some(runner_abort),
                supervisor: Some(supervisor),
                pump: Some(pump),
            },
        );
        Ok(())
    }

    /// Registered agent for `agent_type`.
    #[must_use]
    pub fn agent(&self, agent_type: &str) -> Option<Arc<dyn Agent>> {
        self.inner
            .agents
            .read()
            .get(agent_type)
            .map(|registered| Arc::clone(&registered.agent))
    }

    /// Registered agent types in registration order.
    #[must_use]
    pub fn agent_types(&self) -> Vec<String> {
        self.inner.agents.read().keys().cloned().collect()
    }

    /// Supervision state of `agent_type`.
    #[must_use]
    pub fn agent_status(&self, agent_type: &str) -> Option<AgentStatus> {
        self.inner
            .agents
            .read()
            .get(agent_type)
            .map(|registered| registered.status.lock().clone())
    }

    /// Supervision state of every agent.
    #[must_use]
    pub fn agent_statuses(&self) -> IndexMap<String, AgentStatus> {
        self.inner
            .agents
            .read()
            .iter()
            .map(|(name, registered)| (name.clone(), registered.status.lock().clone()))
            .collect()
    }

    /// Dispatches `task` and returns its result.
    ///
    /// Tasks whose namespace has no registered agent, and every task after shutdown,
    /// fail with no result and touch no agent. Handler failures leave the error text
    /// as the result. Unknown types in a known namespace complete with no result.
    #[instrument(skip(self, task), fields(task_type = %task.task_type(), task_id = %task.id()))]
    pub async fn execute_task(&self, task: &mut AgentTask) -> Option<Value> {
        if self.is_shut_down() {
            warn!("task rejected after shutdown");
            let _ = task.fail(None);
            return None;
        }
        let agent = if task.namespace() == ROUTINE_NAMESPACE {
            None
        } else if let Some(agent) = self.agent(task.namespace()) {
            Some(agent)
        } else {
            debug!(namespace = task.namespace(), "no agent owns this namespace");
            let _ = task.fail(None);
            return None;
        };
        if let Err(err) = task.transition(TaskStatus::Running) {
            warn!(error = %err, "task is not dispatchable");
            return task.result().cloned();
        }

        let handler = self.inner.handlers.get(task.task_type()).copied();
        let outcome = match handler {
            None => Ok(None),
            Some(handler) => {
                let dispatch = self.dispatch(handler, agent, task.parameters().clone());
                match AssertUnwindSafe(dispatch).catch_unwind().await {
                    Ok(outcome) => outcome.map_err(|err| err.to_string()),
                    Err(payload) => Err(format!(
                        "handler panicked: {}",
                        panic_message(payload.as_ref())
                    )),
                }
            }
        };
        let recorded = match outcome {
            Ok(result) => task.complete(result),
            Err(err) => {
                warn!(error = %err, "task failed");
                task.fail(Some(Value::String(err)))
            }
        };
        if let Err(err) = recorded {
            warn!(error = %err, "task status update rejected");
        }

        let parameters = Value::Object(task.parameters().clone());
        self.inner.audit.decision_with(
            AUDIT_SOURCE,
            &format!("Dispatch {}", task.task_type()),
            &format!(
                "Priority {:?} with parameters {parameters}",
                task.priority()
            ),
            1.0,
            json!({
                "task_id": task.id(),
                "task_type": task.task_type(),
                "priority": task.priority(),
                "parameters": parameters,
                "handler": handler,
                "status": task.status(),
            }),
        );
        let _ = self.inner.telemetry.event(
            "orchestrator.task.completed",
            json!({
                "task_id": task.id(),
                "task_type": task.task_type(),
                "status": task.status(),
            }),
        );
        task.result().cloned()
    }

    /// Runs `tasks` one after another, highest priority first, keeping submission
    /// order within a priority. Returns the finished tasks in execution order.
    pub async fn execute_batch(&self, mut tasks: Vec<AgentTask>) -> Vec<AgentTask> {
        tasks.sort_by_key(|task| Reverse(task.priority()));
        for task in &mut tasks {
            self.execute_task(task).await;
        }
        tasks
    }

    async fn dispatch(
        &self,
        handler: TaskHandler,
        agent: Option<Arc<dyn Agent>>,
        parameters: Map<String, Value>,
    ) -> Result<Option<Value>, AgentError> {
        match handler {
            TaskHandler::StressCheck => {
                let wellness = downcast::<WellnessAgent>(agent, "stress check")?;
                wellness.stress_check().map(Some)
            }
            TaskHandler::TrendAnalysis => {
                let career = downcast::<CareerAgent>(agent, "trend analysis")?;
                let analysis = career.analyze_trends().await?;
                Ok(Some(serde_json::to_value(analysis)?))
            }
            TaskHandler::Routine(kind) => {
                let result = self
                    .orchestrate_routine(kind.as_str(), Value::Object(parameters))
                    .await;
                Ok(Some(serde_json::to_value(result)?))
            }
        }
    }

    /// Runs the named routine. Unknown names yield `success = false` with
    /// "Unknown routine".
    #[instrument(skip(self, context))]
    pub async fn orchestrate_routine(&self, name: &str, context: Value) -> RoutineResult {
        if self.is_shut_down() {
            return RoutineResult::new(name, false, "Orchestrator is shut down");
        }
        let Ok(kind) = name.parse::<RoutineKind>() else {
            debug!("unknown routine requested");
            return RoutineResult::unknown(name);
        };
        let context = match context {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let services = Arc::clone(&self.inner.services);
        let result = match kind {
            RoutineKind::MorningRoutine => morning_routine(services, context).await,
            RoutineKind::TravelDisruption => travel_disruption(services, context).await,
            RoutineKind::WellnessIntervention => self.wellness_intervention().await,
        };

        self.inner.audit.system_event(
            AUDIT_SOURCE,
            format!("Routine {name} completed"),
            json!({
                "success": result.success,
                "message": result.message,
                "steps": result.results.keys().collect::<Vec<_>>(),
            }),
        );
        let _ = self.inner.telemetry.log(
            LogLevel::Info,
            "orchestrator.routine",
            json!({ "routine": name, "success": result.success }),
        );
        let _ = self.inner.telemetry.event(
            "orchestrator.routine.completed",
            json!({ "routine": name, "success": result.success }),
        );
        if self.inner.config.notify_routine_results {
            if let Some(text) = &result.notification {
                let intent = NotificationIntent::new(AUDIT_SOURCE, "routine", kind.as_str(), text)
                    .with_data(json!({ "success": result.success }));
                if let Err(err) = self.inner.notifier.notify(intent).await {
                    warn!(error = %err, "routine notification dropped");
                }
            }
        }
        result
    }

    async fn wellness_intervention(&self) -> RoutineResult {
        let mut result = RoutineResult::new(
            RoutineKind::WellnessIntervention.as_str(),
            true,
            "Wellness intervention triggered",
        );
        let wellness = self
            .agent(WELLNESS_AGENT_NAME)
            .and_then(|agent| agent.into_any().downcast::<WellnessAgent>().ok());
        let delegated = match wellness {
            Some(wellness) => match wellness.trigger_intervention().await {
                Ok(()) => true,
                Err(err) => {
                    warn!(error = %err, "wellness intervention not delivered");
                    false
                }
            },
            None => false,
        };
        result
            .results
            .insert("delegated".to_string(), Value::Bool(delegated));
        result
    }

    /// Stops every agent, waits briefly for their loops, and rejects further work.
    /// Safe to call repeatedly and after agents stopped themselves.
    pub async fn shutdown(&self) {
        let first = !self.inner.shutdown.is_cancelled();
        self.inner.shutdown.cancel();
        let mut pending = Vec::new();
        {
            let mut agents = self.inner.agents.write();
            for (agent_type, registered) in agents.iter_mut() {
                registered.agent.stop();
                if let (Some(supervisor), Some(pump), Some(runner)) = (
                    registered.supervisor.take(),
                    registered.pump.take(),
                    registered.runner.take(),
                ) {
                    pending.push((agent_type.clone(), supervisor, pump, runner));
                }
            }
        }
        let grace = self.inner.config.shutdown_grace();
        for (agent_type, mut supervisor, pump, runner) in pending {
            if tokio::time::timeout(grace, &mut supervisor).await.is_err() {
                warn!(agent = %agent_type, "agent loop ignored stop; aborting");
                runner.abort();
                supervisor.abort();
            }
            pump.abort();
        }
        for registered in self.inner.agents.read().values() {
            let mut status = registered.status.lock();
            if *status == AgentStatus::Running {
                *status = AgentStatus::Stopped;
            }
        }
        if first {
            self.inner.audit.system_event(
                AUDIT_SOURCE,
                "Orchestrator shut down",
                json!({ "agents": self.agent_types() }),
            );
            info!("orchestrator shut down");
        }
    }
}

fn downcast<T: Agent>(agent: Option<Arc<dyn Agent>>, purpose: &str) -> Result<Arc<T>, AgentError> {
    let agent = agent.ok_or_else(|| AgentError::Internal(format!("no agent for {purpose}")))?;
    let name = agent.name().to_string();
    agent
        .into_any()
        .downcast::<T>()
        .map_err(|_| AgentError::Internal(format!("agent `{name}` cannot handle {purpose}")))
}

async fn supervise(
    runner: JoinHandle<Result<(), AgentError>>,
    agent_type: String,
    status: Arc<Mutex<AgentStatus>>,
    audit: AuditLog,
    telemetry: RuntimeTelemetry,
) {
    let failure = match runner.await {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(err.to_string()),
        Err(err) if err.is_panic() => Some(format!(
            "panicked: {}",
            panic_message(err.into_panic().as_ref())
        )),
        Err(_) => None,
    };
    let Some(reason) = failure else {
        let mut status = status.lock();
        if *status == AgentStatus::Running {
            *status = AgentStatus::Stopped;
        }
        debug!(agent = %agent_type, "agent loop returned");
        return;
    };
    *status.lock() = AgentStatus::Failed(reason.clone());
    error!(agent = %agent_type, %reason, "agent loop failed");
    audit.system_event(
        AUDIT_SOURCE,
        format!("Agent {agent_type} failed"),
        json!({ "agent_type": agent_type, "reason": reason }),
    );
    let _ = telemetry.event(
        "orchestrator.agent.failed",
        json!({ "agent_type": agent_type, "reason": reason }),
    );
}

async fn pump_snapshots(
    agent: Arc<dyn Agent>,
    agent_type: String,
    mut subscription: SensorSubscription,
    audit: AuditLog,
    shutdown: CancellationToken,
) {
    let stop = agent.context().stop_token();
    loop {
        let snapshot = tokio::select! {
            biased;
            () = stop.cancelled() => break,
            () = shutdown.cancelled() => break,
            next = subscription.next() => match next {
                Some(snapshot) => snapshot,
                None => break,
            },
        };
        match AssertUnwindSafe(agent.on_sensor_data(snapshot))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(agent = %agent_type, error = %err, "snapshot reaction failed"),
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                error!(agent = %agent_type, %reason, "snapshot reaction panicked");
                audit.system_event(
                    AUDIT_SOURCE,
                    format!("Agent {agent_type} panicked handling sensor data"),
                    json!({ "agent_type": agent_type, "reason": reason }),
                );
            }
        }
    }
    if subscription.dropped() > 0 {
        warn!(agent = %agent_type, dropped = subscription.dropped(), "snapshots skipped while lagging");
    }
}
