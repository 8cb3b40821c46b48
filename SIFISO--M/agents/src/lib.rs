#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Sifiso agents: capability-scoped units reacting to sensor snapshots and running
//! periodic analysis, with audit logging and notification intents.

/// Agent contract, shared context and timer helper.
#[path = "../agent.rs"]
pub mod agent;

/// Agent error taxonomy.
#[path = "../error.rs"]
pub mod error;

/// Notification intents handed to an external sink.
#[path = "../notification.rs"]
pub mod notification;

/// Operational telemetry (JSON log + event bus).
#[path = "../telemetry.rs"]
pub mod telemetry;

/// Stress detection, movement breaks and hydration reminders.
#[path = "../wellness/main.rs"]
pub mod wellness;

/// Trend matching, skill gaps, jobs, side projects and networking events.
#[path = "../career/main.rs"]
pub mod career;

pub use agent::{periodic, Agent, AgentCategory, AgentContext};
pub use career::profile::CareerProfile;
pub use career::scoring::{LearningResource, RankedTrend, SkillGap};
pub use career::sources::{
    JobCandidate, NetworkingEvent, Opportunity, OpportunitySource, ProjectIdea,
    StaticOpportunitySource, StaticTrendSource, TrendCandidate, TrendSource,
};
pub use career::{CareerAgent, CareerAnalysis, CareerConfig, CAREER_AGENT_NAME};
pub use error::AgentError;
pub use notification::{NotificationAction, NotificationIntent, NotificationPriority, Notifier};
pub use telemetry::{RuntimeTelemetry, RuntimeTelemetryBuilder};
pub use wellness::analysis::{StressPattern, StressReading, StressTrend, WellnessAnalysis};
pub use wellness::config::WellnessConfig;
pub use wellness::state::{InterventionKind, SittingState};
pub use wellness::{WellnessAgent, WELLNESS_AGENT_NAME};
