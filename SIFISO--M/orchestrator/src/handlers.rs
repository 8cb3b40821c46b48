use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::routines::RoutineKind;

/// Handlers the orchestrator knows how to dispatch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskHandler {
    /// Current stress assessment from the wellness agent.
    StressCheck,
    /// Full career analysis from the career agent.
    TrendAnalysis,
    /// Runs a routine owned by the orchestrator.
    Routine(RoutineKind),
}

/// Fixed task-type to handler table.
#[must_use]
pub fn handler_table() -> IndexMap<&'static str, TaskHandler> {
    IndexMap::from([
        ("wellness.stress_check", TaskHandler::StressCheck),
        ("career.trend_analysis", TaskHandler::TrendAnalysis),
        (
            "routine.morning",
            TaskHandler::Routine(RoutineKind::MorningRoutine),
        ),
        (
            "routine.travel_disruption",
            TaskHandler::Routine(RoutineKind::TravelDisruption),
        ),
    ])
}
