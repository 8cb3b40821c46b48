use sifiso_agents::AgentError;
use thiserror::Error;

use crate::task::TaskStatusError;

/// Failures surfaced by the orchestrator's own API.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The orchestrator was shut down.
    #[error("orchestrator is shut down")]
    ShutDown,
    /// An agent is already registered under this type.
    #[error("agent type `{0}` is already registered")]
    DuplicateAgent(String),
    /// Registration needs a tokio runtime to spawn supervision tasks.
    #[error("no tokio runtime available to supervise `{0}`")]
    NoRuntime(String),
    /// The configuration document failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// An agent rejected a request.
    #[error(transparent)]
    Agent(#[from] AgentError),
    /// A task moved through an illegal status change.
    #[error(transparent)]
    TaskStatus(#[from] TaskStatusError),
}
