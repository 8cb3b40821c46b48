//! Named multi-step routines built on [`RoutineServices`].

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::task::JoinSet;
use tracing::warn;

use crate::services::{RoutineContext, RoutineServices};

/// Keys populated by the morning routine, in result order.
pub const MORNING_KEYS: [&str; 4] = ["coffee", "lighting", "news", "calendar"];

/// Known routines.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RoutineKind {
    /// Coffee, lighting, news and calendar in parallel.
    MorningRoutine,
    /// Detect, then reroute and notify in parallel, then update the calendar.
    TravelDisruption,
    /// Breathing break through the wellness agent.
    WellnessIntervention,
}

impl RoutineKind {
    /// Routine name as accepted by the orchestrator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MorningRoutine => "morning_routine",
            Self::TravelDisruption => "travel_disruption",
            Self::WellnessIntervention => "wellness_intervention",
        }
    }
}

impl fmt::Display for RoutineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoutineKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "morning_routine" => Ok(Self::MorningRoutine),
            "travel_disruption" => Ok(Self::TravelDisruption),
            "wellness_intervention" => Ok(Self::WellnessIntervention),
            other => Err(format!("unknown routine `{other}`")),
        }
    }
}

/// Outcome of a routine run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutineResult {
    /// Routine name as requested.
    pub routine: String,
    /// Whether every step succeeded.
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
    /// Step results keyed by step name.
    pub results: IndexMap<String, Value>,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// Finish time.
    pub completed_at: DateTime<Utc>,
    /// Text pushed to the user, if any.
    pub notification: Option<String>,
}

impl RoutineResult {
    /// Empty result started now.
    #[must_use]
    pub fn new(routine: impl Into<String>, success: bool, message: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            routine: routine.into(),
            success,
            message: message.into(),
            results: IndexMap::new(),
            started_at: now,
            completed_at: now,
            notification: None,
        }
    }

    /// Result for a name no routine answers to.
    #[must_use]
    pub fn unknown(routine: impl Into<String>) -> Self {
        Self::new(routine, false, "Unknown routine")
    }

    fn finish(mut self) -> Self {
        self.completed_at = Utc::now();
        self
    }
}

fn error_value(err: &str) -> Value {
    json!({ "error": err })
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "step panicked".to_string())
}

/// Runs a step, turning errors and panics into a message.
async fn guarded<F>(step: F) -> Result<Value, String>
where
    F: Future<Output = anyhow::Result<Value>>,
{
    match AssertUnwindSafe(step).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(format!("{err:#}")),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

/// Runs the four morning steps concurrently and waits for all of them.
///
/// A failing step is recorded under its key as `{"error": ...}` without affecting the
/// others.
pub async fn morning_routine(
    services: Arc<dyn RoutineServices>,
    context: RoutineContext,
) -> RoutineResult {
    let mut result = RoutineResult::new(RoutineKind::MorningRoutine.as_str(), true, "");
    let context = Arc::new(context);
    let sleep_quality = context
        .get("sleep_quality")
        .and_then(Value::as_f64)
        .unwrap_or(0.7);

    let mut steps = JoinSet::new();
    for key in MORNING_KEYS {
        let services = Arc::clone(&services);
        let context = Arc::clone(&context);
        steps.spawn(async move {
            let outcome = match key {
                "coffee" => guarded(services.start_device("coffee_maker", &context)).await,
                "lighting" => guarded(services.adjust_lighting(sleep_quality)).await,
                "news" => guarded(services.curate_news(&context)).await,
                _ => guarded(services.summarize_calendar(&context)).await,
            };
            (key, outcome)
        });
    }

    let mut collected: IndexMap<&'static str, Result<Value, String>> = IndexMap::new();
    while let Some(joined) = steps.join_next().await {
        match joined {
            Ok((key, outcome)) => {
                collected.insert(key, outcome);
            }
            Err(err) => warn!(error = %err, "morning step aborted"),
        }
    }

    let mut failed = Vec::new();
    for key in MORNING_KEYS {
        let value = match collected.shift_remove(key) {
            Some(Ok(value)) => value,
            Some(Err(err)) => {
                failed.push(key);
                error_value(&err)
            }
            None => {
                failed.push(key);
                error_value("step did not complete")
            }
        };
        result.results.insert(key.to_string(), value);
    }

    let minutes = result.results["coffee"]
        .get("ready_in_minutes")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let calendar = result.results["calendar"]
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    result.notification = Some(
        format!("Good morning! Coffee will be ready in {minutes} minutes. {calendar}")
            .trim_end()
            .to_string(),
    );
    result.success = failed.is_empty();
    result.message = if failed.is_empty() {
        "Morning routine completed".to_string()
    } else {
        format!("Morning routine completed with failed steps: {}", failed.join(", "))
    };
    result.finish()
}

/// Detects a disruption; when found, reroutes and notifies contacts concurrently and
/// then updates the calendar.
pub async fn travel_disruption(
    services: Arc<dyn RoutineServices>,
    context: RoutineContext,
) -> RoutineResult {
    let mut result = RoutineResult::new(RoutineKind::TravelDisruption.as_str(), true, "");
    let disruption = match AssertUnwindSafe(services.detect_disruption(&context))
        .catch_unwind()
        .await
    {
        Ok(Ok(disruption)) => disruption,
        Ok(Err(err)) => {
            result.success = false;
            result.message = format!("Disruption check failed: {err:#}");
            return result.finish();
        }
        Err(payload) => {
            result.success = false;
            result.message = format!("Disruption check failed: {}", panic_message(payload.as_ref()));
            return result.finish();
        }
    };
    if !disruption.detected {
        result.message = "No disruption detected".to_string();
        return result.finish();
    }
    result.results.insert(
        "disruption".to_string(),
        serde_json::to_value(&disruption).unwrap_or(Value::Null),
    );

    let (rerouting, contacts) = tokio::join!(
        guarded(services.find_alternative_route(&context, &disruption)),
        guarded(services.notify_contacts(&context, &disruption)),
    );

    let mut failed = Vec::new();
    let calendar = match &rerouting {
        Ok(route) => guarded(services.update_calendar(&context, route)).await,
        Err(_) => Err("no route to reschedule against".to_string()),
    };
    for (key, outcome) in [
        ("rerouting", rerouting),
        ("notifications", contacts),
        ("calendar_update", calendar),
    ] {
        let value = outcome.unwrap_or_else(|err| {
            failed.push(key);
            error_value(&err)
        });
        result.results.insert(key.to_string(), value);
    }

    if let Some(route) = result.results["rerouting"]
        .get("recommended_route")
        .and_then(|route| route.get("route_name"))
        .and_then(Value::as_str)
    {
        let eta = result.results["rerouting"]["recommended_route"]["arrival_time"]
            .as_str()
            .unwrap_or("unknown");
        result.notification = Some(format!(
            "Travel disruption handled. Rerouted via {route}. Contacts notified. ETA: {eta}"
        ));
    }
    result.success = failed.is_empty();
    result.message = if failed.is_empty() {
        format!(
            "Handled {} disruption ({})",
            disruption.kind, disruption.severity
        )
    } else {
        format!("Disruption handled with failed steps: {}", failed.join(", "))
    };
    result.finish()
}
