//! Notification intents handed to the external notification sink.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared_event_bus::{EventPublisher, MemoryEventBus};
use uuid::Uuid;

use crate::error::AgentError;

/// Delivery priority requested from the sink.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    /// Informational.
    Low,
    /// Default.
    Normal,
    /// Should interrupt the user.
    High,
}

/// Button offered alongside a notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationAction {
    /// Action identifier reported back as a user interaction.
    pub id: String,
    /// Button label.
    pub label: String,
}

impl NotificationAction {
    /// Creates an action.
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }

    /// `accept`, `snooze`, `dismiss`.
    #[must_use]
    pub fn standard() -> Vec<Self> {
        vec![
            Self::new("accept", "Accept"),
            Self::new("snooze", "Snooze"),
            Self::new("dismiss", "Dismiss"),
        ]
    }
}

/// Something the core wants shown to the user. Rendering and delivery happen elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationIntent {
    /// Unique identifier.
    pub id: Uuid,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Producing agent or component.
    pub source: String,
    /// Title line.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Requested priority.
    pub priority: NotificationPriority,
    /// Grouping category (`wellness`, `career`, `routine`, ...).
    pub category: String,
    /// Optional actions.
    #[serde(default)]
    pub actions: Vec<NotificationAction>,
    /// Optional structured data.
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl NotificationIntent {
    /// Creates an intent with normal priority and no actions.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        category: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            source: source.into(),
            title: title.into(),
            message: message.into(),
            priority: NotificationPriority::Normal,
            category: category.into(),
            actions: Vec::new(),
            data: Map::new(),
        }
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the actions.
    #[must_use]
    pub fn with_actions(mut self, actions: Vec<NotificationAction>) -> Self {
        self.actions = actions;
        self
    }

    /// Merges a JSON object into the structured data.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        if let Value::Object(map) = data {
            self.data.extend(map);
        }
        self
    }
}

/// Handle to the notification sink.
#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn EventPublisher<NotificationIntent>>,
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier").finish_non_exhaustive()
    }
}

impl Notifier {
    /// Wraps a sink.
    #[must_use]
    pub fn new(sink: Arc<dyn EventPublisher<NotificationIntent>>) -> Self {
        Self { sink }
    }

    /// Notifier backed by an in-memory bus, returned alongside it for inspection.
    #[must_use]
    pub fn in_memory(capacity: usize) -> (Self, Arc<MemoryEventBus<NotificationIntent>>) {
        let bus = Arc::new(MemoryEventBus::new(capacity));
        (Self::new(bus.clone()), bus)
    }

    /// Hands an intent to the sink.
    pub async fn notify(&self, intent: NotificationIntent) -> Result<(), AgentError> {
        self.sink
            .publish(intent)
            .await
            .map_err(|err| AgentError::Notification(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn intents_reach_the_sink() {
        let (notifier, bus) = Notifier::in_memory(4);
        let intent = NotificationIntent::new("wellness", "wellness", "Hydration", "Drink water")
            .with_priority(NotificationPriority::High)
            .with_actions(NotificationAction::standard())
            .with_data(json!({"hydration": 0.3}));
        notifier.notify(intent).await.unwrap();
        let sent = bus.snapshot();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].actions.len(), 3);
        assert_eq!(sent[0].data["hydration"], 0.3);
        assert_eq!(sent[0].priority, NotificationPriority::High);
    }
}
