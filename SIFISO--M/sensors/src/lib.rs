#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Sensor fusion for the Sifiso runtime.
//!
//! [`SensorStream`] owns the single authoritative snapshot. Real sensors push
//! [`SensorEvent`]s through pluggable [`SensorSource`]s, a [`SyntheticGenerator`] fills in
//! when no hardware is attached, and every published snapshot lands in a bounded
//! [`SensorHistory`].

/// Stream tunables.
pub mod config;
/// Stream failures.
pub mod error;
pub mod generator;
pub mod history;
pub mod model;
pub mod source;
pub mod stream;
pub mod stress;

pub use config::SensorStreamConfig;
pub use error::SensorError;
pub use generator::{ForcedState, SyntheticGenerator};
pub use history::{HistoryWindow, SensorHistory};
pub use model::{
    BiosensorDelta, BiosensorReadings, ContextDelta, ContextReadings, EnvironmentalDelta,
    EnvironmentalReadings, LocationContext, MotionDelta, MotionReadings, Posture, SensorDelta,
    SensorEvent, SensorSnapshot,
};
pub use source::{ScriptedSensorSource, SensorSource};
pub use stream::{SensorStream, SensorSubscription};
pub use stress::{
    clamp_unit, stress_score, HrvMetrics, StressBreakdown, StressLevel, StressRecommendation,
};
