use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use sifiso_agents::agent::Agent;
use sifiso_audit::{AuditFilter, LogType, Page};
use sifiso_orchestrator::{
    AgentStatus, AgentTask, Disruption, RoutineContext, RoutineServices, SifisoConfig,
    SifisoRuntime, SimulatedRoutineServices, TaskPriority, TaskStatus, MORNING_KEYS,
};
use sifiso_sensors::{Posture, SensorDelta};

async fn settle<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

fn runtime() -> SifisoRuntime {
    SifisoRuntime::builder(SifisoConfig::default())
        .build()
        .unwrap()
}

fn decisions(runtime: &SifisoRuntime, message: &str) -> usize {
    runtime
        .audit()
        .all()
        .iter()
        .filter(|entry| entry.log_type == LogType::AiDecision && entry.message == message)
        .count()
}

#[tokio::test]
async fn stressed_snapshot_flows_to_decision_and_notification() {
    let runtime = runtime();
    runtime
        .stream()
        .update(
            &SensorDelta::new()
                .heart_rate(105.0)
                .hrv(15.0)
                .skin_conductance(13.0)
                .breathing_rate(23.0),
        )
        .unwrap();

    assert!(settle(|| !runtime.notifications().is_empty()).await);
    let notifications = runtime.notifications();
    assert_eq!(notifications[0].title, "Take a Breathing Break");

    let entries = runtime.audit().all();
    let decision = entries
        .iter()
        .find(|entry| entry.message == "Trigger breathing break")
        .unwrap();
    let access = entries
        .iter()
        .find(|entry| entry.log_type == LogType::DataAccess && entry.agent == "wellness")
        .unwrap();
    assert!(access.seq < decision.seq);
    runtime.shutdown().await;
}

#[tokio::test]
async fn prolonged_sitting_prompts_one_break_per_cooldown() {
    let runtime = runtime();
    let start = Utc::now();
    let sitting = SensorDelta::new().posture(Posture::Sitting);
    for minute in [0, 30, 60, 91, 100, 110] {
        runtime
            .stream()
            .update_at(&sitting, start + chrono::Duration::minutes(minute))
            .unwrap();
    }
    assert!(
        settle(|| {
            runtime
                .audit()
                .all()
                .iter()
                .filter(|entry| entry.agent == "wellness" && entry.log_type == LogType::DataAccess)
                .count()
                >= 6
        })
        .await
    );
    assert_eq!(decisions(&runtime, "Suggest movement break"), 1);
    runtime.shutdown().await;
}

#[tokio::test]
async fn tasks_route_by_namespace() {
    let runtime = runtime();
    let orchestrator = runtime.orchestrator();

    let mut stress = AgentTask::new("wellness.stress_check");
    let result = orchestrator.execute_task(&mut stress).await.unwrap();
    assert_eq!(stress.status(), TaskStatus::Completed);
    assert!(["HIGH", "MODERATE", "LOW"].contains(&result["stress_level"].as_str().unwrap()));

    let mut career = AgentTask::new("career.trend_analysis");
    let analysis = orchestrator.execute_task(&mut career).await.unwrap();
    assert_eq!(analysis["recommendations"].as_array().unwrap().len(), 3);

    let before = runtime.audit().len();
    let mut stray = AgentTask::new("finance.budget_review");
    assert!(orchestrator.execute_task(&mut stray).await.is_none());
    assert_eq!(stray.status(), TaskStatus::Failed);
    assert_eq!(runtime.audit().len(), before);
    assert!(runtime.wellness().is_running());
    runtime.shutdown().await;
}

#[tokio::test]
async fn shutdown_rejects_tasks_and_stops_agents() {
    let runtime = runtime();
    runtime.shutdown().await;
    runtime.shutdown().await;

    for name in ["wellness", "career"] {
        assert_eq!(
            runtime.orchestrator().agent_status(name),
            Some(AgentStatus::Stopped)
        );
    }
    let before = runtime.audit().len();
    let mut task = AgentTask::new("wellness.stress_check").with_priority(TaskPriority::Critical);
    assert!(runtime.orchestrator().execute_task(&mut task).await.is_none());
    assert_eq!(task.status(), TaskStatus::Failed);
    assert!(task.result().is_none());
    assert_eq!(runtime.audit().len(), before);
    assert!(!runtime.wellness().is_running());
    assert!(runtime
        .stream()
        .update(&SensorDelta::new().heart_rate(70.0))
        .is_err());
}

struct NoNews;

#[async_trait]
impl RoutineServices for NoNews {
    async fn start_device(&self, device: &str, context: &RoutineContext) -> Result<Value> {
        SimulatedRoutineServices.start_device(device, context).await
    }

    async fn adjust_lighting(&self, sleep_quality: f64) -> Result<Value> {
        SimulatedRoutineServices.adjust_lighting(sleep_quality).await
    }

    async fn curate_news(&self, _context: &RoutineContext) -> Result<Value> {
        bail!("news feed unreachable")
    }

    async fn summarize_calendar(&self, context: &RoutineContext) -> Result<Value> {
        SimulatedRoutineServices.summarize_calendar(context).await
    }

    async fn detect_disruption(&self, trip: &RoutineContext) -> Result<Disruption> {
        SimulatedRoutineServices.detect_disruption(trip).await
    }

    async fn find_alternative_route(
        &self,
        trip: &RoutineContext,
        disruption: &Disruption,
    ) -> Result<Value> {
        SimulatedRoutineServices
            .find_alternative_route(trip, disruption)
            .await
    }

    async fn notify_contacts(&self, trip: &RoutineContext, disruption: &Disruption) -> Result<Value> {
        SimulatedRoutineServices.notify_contacts(trip, disruption).await
    }

    async fn update_calendar(&self, trip: &RoutineContext, rerouting: &Value) -> Result<Value> {
        SimulatedRoutineServices.update_calendar(trip, rerouting).await
    }
}

#[tokio::test]
async fn morning_routine_reports_every_step_even_when_one_fails() {
    let runtime = SifisoRuntime::builder(SifisoConfig::default())
        .services(Arc::new(NoNews))
        .build()
        .unwrap();
    let result = runtime
        .orchestrator()
        .orchestrate_routine("morning_routine", json!({ "sleep_quality": 0.5 }))
        .await;
    assert!(!result.success);
    assert!(result.message.ends_with("failed steps: news"));
    let keys: Vec<&str> = result.results.keys().map(String::as_str).collect();
    assert_eq!(keys, MORNING_KEYS);
    assert_eq!(result.results["news"]["error"], "news feed unreachable");
    assert_eq!(result.results["lighting"]["brightness"], 60);
    assert!(runtime
        .notifications()
        .iter()
        .any(|intent| intent.message.starts_with("Good morning!")));
    runtime.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_audit_writers_are_totally_ordered() {
    let runtime = runtime();
    let audit = runtime.audit().clone();
    let before = audit.len();
    let mut writers = tokio::task::JoinSet::new();
    for writer in 0..8 {
        let audit = audit.clone();
        writers.spawn(async move {
            for index in 0..100 {
                audit.data_access(format!("writer-{writer}"), "biosensors", &format!("sample {index}"));
                tokio::task::yield_now().await;
            }
        });
    }
    while let Some(joined) = writers.join_next().await {
        joined.unwrap();
    }

    let entries = audit.all();
    assert_eq!(entries.len(), before + 800);
    assert!(entries.windows(2).all(|pair| pair[0].seq < pair[1].seq));
    let page = audit.query(
        &AuditFilter::new().with_agent("writer-3"),
        Page::new(0, 25),
    );
    assert_eq!(page.total, 100);
    assert_eq!(page.entries.len(), 25);
    runtime.shutdown().await;
}

#[tokio::test]
async fn lifecycle_events_reach_the_bus() {
    let runtime = runtime();
    let mut task = AgentTask::new("routine.travel_disruption");
    runtime.orchestrator().execute_task(&mut task).await;
    assert!(
        settle(|| {
            let events = runtime.events();
            let seen = |kind: &str| events.iter().any(|event| event.event_type == kind);
            seen("orchestrator.agent.registered")
                && seen("orchestrator.routine.completed")
                && seen("orchestrator.task.completed")
        })
        .await
    );
    runtime.shutdown().await;
}
