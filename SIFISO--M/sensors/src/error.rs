use thiserror::Error;

/// Sensor stream failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SensorError {
    /// The stream was shut down; no further snapshots are published.
    #[error("sensor stream is closed")]
    Closed,
    /// A pluggable source failed to produce an event.
    #[error("sensor source `{source_name}` failed: {reason}")]
    Source {
        /// Source name.
        source_name: String,
        /// Failure description.
        reason: String,
    },
    /// A forced-state name was not recognized.
    #[error("unknown forced state `{0}`")]
    UnknownState(String),
}
