use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use serde_json::Value;
use shared_event_bus::{EventPublisher, EventRecord};
use shared_logging::{JsonLogger, LogLevel, LogRecord};
use tokio::runtime::Handle;

/// Builder for runtime telemetry sinks.
pub struct RuntimeTelemetryBuilder {
    component: String,
    log_path: Option<PathBuf>,
    memory_log: bool,
    min_level: LogLevel,
    event_publisher: Option<Arc<dyn EventPublisher<EventRecord>>>,
}

impl RuntimeTelemetryBuilder {
    /// Creates the builder.
    #[must_use]
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            log_path: None,
            memory_log: false,
            min_level: LogLevel::Debug,
            event_publisher: None,
        }
    }

    /// Writes JSON lines to `path`.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Keeps records in memory instead of a file.
    #[must_use]
    pub const fn memory_log(mut self) -> Self {
        self.memory_log = true;
        self
    }

    /// Drops records below `level`.
    #[must_use]
    pub const fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Sets the event publisher.
    #[must_use]
    pub fn event_publisher(mut self, publisher: Arc<dyn EventPublisher<EventRecord>>) -> Self {
        self.event_publisher = Some(publisher);
        self
    }

    /// Builds the telemetry handle.
    pub fn build(self) -> Result<RuntimeTelemetry> {
        let logger = match (self.log_path, self.memory_log) {
            (Some(path), _) => Some(Arc::new(
                JsonLogger::new(path)?.with_min_level(self.min_level),
            )),
            (None, true) => Some(Arc::new(
                JsonLogger::in_memory().with_min_level(self.min_level),
            )),
            (None, false) => None,
        };
        Ok(RuntimeTelemetry {
            inner: Arc::new(TelemetryInner {
                component: self.component,
                logger,
                publisher: self.event_publisher,
            }),
        })
    }
}

/// Operational telemetry shared by agents and the orchestrator.
///
/// Records go to the JSON logger and to `tracing`; events go to the bus. Neither path
/// blocks the caller.
#[derive(Clone)]
pub struct RuntimeTelemetry {
    inner: Arc<TelemetryInner>,
}

impl fmt::Debug for RuntimeTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeTelemetry")
            .field("component", &self.inner.component)
            .field("logger", &self.inner.logger.is_some())
            .field("publisher", &self.inner.publisher.is_some())
            .finish()
    }
}

struct TelemetryInner {
    component: String,
    logger: Option<Arc<JsonLogger>>,
    publisher: Option<Arc<dyn EventPublisher<EventRecord>>>,
}

impl RuntimeTelemetry {
    /// Returns a builder.
    #[must_use]
    pub fn builder(component: impl Into<String>) -> RuntimeTelemetryBuilder {
        RuntimeTelemetryBuilder::new(component)
    }

    /// Telemetry that only mirrors to `tracing`.
    #[must_use]
    pub fn disabled(component: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(TelemetryInner {
                component: component.into(),
                logger: None,
                publisher: None,
            }),
        }
    }

    /// Same sinks under a different component name.
    #[must_use]
    pub fn scoped(&self, component: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(TelemetryInner {
                component: component.into(),
                logger: self.inner.logger.clone(),
                publisher: self.inner.publisher.clone(),
            }),
        }
    }

    /// Component name.
    #[must_use]
    pub fn component(&self) -> &str {
        &self.inner.component
    }

    /// Logs structured fields.
    pub fn log(&self, level: LogLevel, message: &str, fields: Value) -> Result<()> {
        let component = self.inner.component.as_str();
        match level {
            LogLevel::Debug => tracing::debug!(component, %fields, "{message}"),
            LogLevel::Info => tracing::info!(component, %fields, "{message}"),
            LogLevel::Warn => tracing::warn!(component, %fields, "{message}"),
            LogLevel::Error => tracing::error!(component, %fields, "{message}"),
        }
        if let Some(logger) = &self.inner.logger {
            logger.log(&LogRecord::new(component, level, message).with_fields(fields))?;
        }
        Ok(())
    }

    /// Emits an event on the bus without waiting for delivery.
    pub fn event(&self, event_type: &str, payload: Value) -> Result<()> {
        let Some(publisher) = &self.inner.publisher else {
            return Ok(());
        };
        let record = EventRecord::new(self.inner.component.clone(), event_type, payload);
        match Handle::try_current() {
            Ok(handle) => {
                let publisher = Arc::clone(publisher);
                handle.spawn(async move {
                    if let Err(err) = publisher.publish(record).await {
                        tracing::warn!(error = %err, "telemetry event publish failed");
                    }
                });
            }
            Err(_) => {
                tracing::debug!(event_type, "telemetry event dropped outside a runtime");
            }
        }
        Ok(())
    }

    /// Buffered records for in-memory telemetry.
    #[must_use]
    pub fn records(&self) -> Vec<LogRecord> {
        self.inner
            .logger
            .as_ref()
            .map(|logger| logger.records())
            .unwrap_or_default()
    }
}
