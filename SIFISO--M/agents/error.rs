use sifiso_sensors::SensorError;
use thiserror::Error;

/// Failures raised by agents, their sources, and their task handlers.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The sensor stream rejected or could not serve a request.
    #[error("sensor stream error: {0}")]
    Sensor(#[from] SensorError),
    /// An external data source failed.
    #[error("source `{source_name}` failed: {reason}")]
    Source {
        /// Source name.
        source_name: String,
        /// Failure description.
        reason: String,
    },
    /// The notification sink refused an intent.
    #[error("notification dispatch failed: {0}")]
    Notification(String),
    /// A task parameter was missing or malformed.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// What was wrong with it.
        reason: String,
    },
    /// The agent was asked to work after it stopped.
    #[error("agent `{0}` is stopped")]
    Stopped(String),
    /// Catch-all for internal issues.
    #[error("internal agent error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Shorthand for [`AgentError::Source`].
    #[must_use]
    pub fn source_failure(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Source {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
