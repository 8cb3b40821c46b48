#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Central coordinator of the Sifiso runtime.
//!
//! Registers agents and supervises their loops, routes tasks by namespace, runs
//! multi-step routines, and bootstraps the whole runtime from a TOML document.

/// TOML configuration document.
pub mod config;
/// Orchestrator failures.
pub mod error;
/// Task-type to handler table.
pub mod handlers;
pub mod orchestrator;
pub mod routines;
pub mod runtime;
pub mod services;
/// Task model and status lifecycle.
pub mod task;

pub use config::{CareerSection, PermissionsConfig, SifisoConfig, DEFAULT_GRANTS};
pub use error::OrchestratorError;
pub use handlers::{handler_table, TaskHandler};
pub use orchestrator::{
    AgentStatus, Orchestrator, OrchestratorBuilder, OrchestratorConfig, ROUTINE_NAMESPACE,
};
pub use routines::{morning_routine, travel_disruption, RoutineKind, RoutineResult, MORNING_KEYS};
pub use runtime::{SifisoRuntime, SifisoRuntimeBuilder};
pub use services::{Disruption, RoutineContext, RoutineServices, SimulatedRoutineServices};
pub use task::{AgentTask, TaskPriority, TaskStatus, TaskStatusError};
