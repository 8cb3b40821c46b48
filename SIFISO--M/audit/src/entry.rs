use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AuditError;

/// Category of a transparency entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogType {
    /// Personal data was read.
    DataAccess,
    /// An agent made an autonomous decision.
    AiDecision,
    /// Lifecycle or failure of a runtime component.
    SystemEvent,
    /// The user acted on something the runtime produced.
    UserInteraction,
    /// Permission or privacy-relevant condition.
    PrivacyEvent,
}

impl LogType {
    /// Every type, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::DataAccess,
        Self::AiDecision,
        Self::SystemEvent,
        Self::UserInteraction,
        Self::PrivacyEvent,
    ];

    /// Upper-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DataAccess => "DATA_ACCESS",
            Self::AiDecision => "AI_DECISION",
            Self::SystemEvent => "SYSTEM_EVENT",
            Self::UserInteraction => "USER_INTERACTION",
            Self::PrivacyEvent => "PRIVACY_EVENT",
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogType {
    type Err = AuditError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| AuditError::UnknownType(value.to_string()))
    }
}

/// One immutable transparency record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    /// Insertion sequence number; the total order of the log.
    pub seq: u64,
    /// Time of append.
    pub timestamp: DateTime<Utc>,
    /// Entry category.
    #[serde(rename = "type")]
    pub log_type: LogType,
    /// Originating agent or component.
    pub agent: String,
    /// Human-readable summary.
    pub message: String,
    /// Structured details.
    #[serde(default)]
    pub details: Map<String, Value>,
}

impl LogEntry {
    /// Confidence recorded on a decision entry, if present.
    #[must_use]
    pub fn confidence(&self) -> Option<f64> {
        self.details.get("confidence").and_then(Value::as_f64)
    }

    /// Whether `needle` occurs (case-insensitively) in the message or serialized details.
    #[must_use]
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.message.to_lowercase().contains(&needle)
            || Value::Object(self.details.clone())
                .to_string()
                .to_lowercase()
                .contains(&needle)
    }
}

/// Clamps a confidence to [0, 1], mapping NaN to 0.
#[must_use]
pub fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

pub(crate) fn details_from(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".into(), other);
            map
        }
    }
}
