#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Structured JSON-lines logging shared by the sensor, agent, and orchestrator crates.
//!
//! Records are operational diagnostics. The user-facing transparency trail lives in
//! `sifiso-audit` and is never routed through this crate.

use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Log severity level, ordered from least to most severe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Debug information.
    Debug,
    /// Informational events.
    Info,
    /// Warning indicator.
    Warn,
    /// Error indicator.
    Error,
}

/// Structured log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// Timestamp in ISO8601.
    pub timestamp: DateTime<Utc>,
    /// Component emitting the log (`sensors.stream`, `agent.wellness`, ...).
    pub component: String,
    /// Severity.
    pub level: LogLevel,
    /// Human-readable message, usually a dotted event name.
    pub message: String,
    /// Structured fields attached to the record.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl LogRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(component: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            component: component.into(),
            level,
            message: message.into(),
            fields: serde_json::Map::new(),
        }
    }

    /// Attaches the members of a JSON object as fields. Non-object values are stored under `value`.
    #[must_use]
    pub fn with_fields(mut self, fields: serde_json::Value) -> Self {
        match fields {
            serde_json::Value::Object(map) => self.fields = map,
            serde_json::Value::Null => {}
            other => {
                self.fields.insert("value".into(), other);
            }
        }
        self
    }
}

#[derive(Debug)]
enum LogTarget {
    File { path: PathBuf, writer: Mutex<File> },
    Memory(Mutex<Vec<LogRecord>>),
}

/// Thread-safe JSON logger with append-only semantics.
#[derive(Debug)]
pub struct JsonLogger {
    target: LogTarget,
    min_level: LogLevel,
}

impl JsonLogger {
    /// Creates or opens a file-backed logger at the desired path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        Ok(Self {
            target: LogTarget::File {
                path,
                writer: Mutex::new(file),
            },
            min_level: LogLevel::Debug,
        })
    }

    /// Creates a logger that keeps records in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            target: LogTarget::Memory(Mutex::new(Vec::new())),
            min_level: LogLevel::Debug,
        }
    }

    /// Drops records below `level`.
    #[must_use]
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Returns whether a record at `level` would be written.
    #[must_use]
    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    /// Writes a log record. Records below the minimum level are ignored.
    pub fn log(&self, record: &LogRecord) -> Result<()> {
        if !self.enabled(record.level) {
            return Ok(());
        }
        match &self.target {
            LogTarget::File { writer, .. } => {
                let mut writer = writer.lock();
                serde_json::to_writer(&mut *writer, record)?;
                writer.write_all(b"\n")?;
                writer.flush()?;
            }
            LogTarget::Memory(records) => records.lock().push(record.clone()),
        }
        Ok(())
    }

    /// Returns the file path for file-backed loggers.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.target {
            LogTarget::File { path, .. } => Some(path),
            LogTarget::Memory(_) => None,
        }
    }

    /// Returns buffered records for in-memory loggers (empty for file loggers).
    #[must_use]
    pub fn records(&self) -> Vec<LogRecord> {
        match &self.target {
            LogTarget::File { .. } => Vec::new(),
            LogTarget::Memory(records) => records.lock().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn writes_json_lines() {
        let dir = tempdir().unwrap();
        let logger = JsonLogger::new(dir.path().join("nested/test.log")).unwrap();
        logger
            .log(
                &LogRecord::new("sensors.stream", LogLevel::Info, "stream.started")
                    .with_fields(json!({ "tick_ms": 1000 })),
            )
            .unwrap();
        let content = fs::read_to_string(logger.path().unwrap()).unwrap();
        assert!(content.contains("\"message\":\"stream.started\""));
        assert!(content.contains("\"tick_ms\":1000"));
        assert!(content.ends_with('\n'));
    }

    #[test]
    fn min_level_filters_records() {
        let logger = JsonLogger::in_memory().with_min_level(LogLevel::Warn);
        logger
            .log(&LogRecord::new("agent", LogLevel::Info, "ignored"))
            .unwrap();
        logger
            .log(&LogRecord::new("agent", LogLevel::Error, "kept"))
            .unwrap();
        let records = logger.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "kept");
    }

    #[test]
    fn scalar_fields_are_wrapped() {
        let record = LogRecord::new("agent", LogLevel::Debug, "tick").with_fields(json!(3));
        assert_eq!(record.fields.get("value"), Some(&json!(3)));
    }
}
