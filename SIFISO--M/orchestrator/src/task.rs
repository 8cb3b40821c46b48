use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Dispatch priority; batches run higher priorities first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    /// Background work.
    Low,
    /// Default priority.
    #[default]
    Normal,
    /// Time-sensitive work.
    High,
    /// Must run before anything else.
    Critical,
}

/// Lifecycle of a task: `Pending -> Running -> Completed | Failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Not yet dispatched.
    #[default]
    Pending,
    /// Handler in flight.
    Running,
    /// Handler returned a value.
    Completed,
    /// Handler failed, or the task could not be dispatched.
    Failed,
}

impl TaskStatus {
    /// Whether no further transitions are allowed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// `Pending -> Failed` covers tasks rejected before dispatch.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running | Self::Failed)
                | (Self::Running, Self::Completed | Self::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        })
    }
}

/// Rejected status change.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("illegal task transition {from} -> {to}")]
pub struct TaskStatusError {
    /// Current status.
    pub from: TaskStatus,
    /// Requested status.
    pub to: TaskStatus,
}

/// A unit of dispatchable work addressed by a dot-namespaced type such as
/// `wellness.stress_check`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentTask {
    id: Uuid,
    task_type: String,
    priority: TaskPriority,
    parameters: Map<String, Value>,
    status: TaskStatus,
    result: Option<Value>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl AgentTask {
    /// Pending task with normal priority and no parameters.
    #[must_use]
    pub fn new(task_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_type: task_type.into(),
            priority: TaskPriority::Normal,
            parameters: Map::new(),
            status: TaskStatus::Pending,
            result: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Replaces parameters with the fields of `parameters` (non-objects are ignored).
    #[must_use]
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        if let Value::Object(map) = parameters {
            self.parameters = map;
        }
        self
    }

    /// Adds one parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Full task type.
    #[must_use]
    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    /// Owning namespace: the text before the first `.`, or the whole type.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.task_type
            .split_once('.')
            .map_or(self.task_type.as_str(), |(namespace, _)| namespace)
    }

    /// Priority.
    #[must_use]
    pub const fn priority(&self) -> TaskPriority {
        self.priority
    }

    /// Parameters.
    #[must_use]
    pub const fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Handler result, or the error text for failed handlers.
    #[must_use]
    pub const fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Creation time.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time the handler started.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Time the task reached a terminal status.
    #[must_use]
    pub const fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Moves to `next`, stamping start and finish times.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStatusError`] for transitions out of a terminal status or backwards.
    pub fn transition(&mut self, next: TaskStatus) -> Result<(), TaskStatusError> {
        if !self.status.can_transition_to(next) {
            return Err(TaskStatusError {
                from: self.status,
                to: next,
            });
        }
        let now = Utc::now();
        match next {
            TaskStatus::Running => self.started_at = Some(now),
            TaskStatus::Completed | TaskStatus::Failed => self.finished_at = Some(now),
            TaskStatus::Pending => {}
        }
        self.status = next;
        Ok(())
    }

    /// Marks the task completed with `result`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStatusError`] unless the task is running.
    pub fn complete(&mut self, result: Option<Value>) -> Result<(), TaskStatusError> {
        self.transition(TaskStatus::Completed)?;
        self.result = result;
        Ok(())
    }

    /// Marks the task failed with an optional result (error text for handler failures).
    ///
    /// # Errors
    ///
    /// Returns [`TaskStatusError`] if the task already finished.
    pub fn fail(&mut self, result: Option<Value>) -> Result<(), TaskStatusError> {
        self.transition(TaskStatus::Failed)?;
        self.result = result;
        Ok(())
    }
}
