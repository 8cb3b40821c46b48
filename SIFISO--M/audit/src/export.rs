//! Textual export formats.

use std::fmt::Write as _;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entry::LogEntry;
use crate::error::AuditError;

/// Timestamp layout used by every export format (always UTC).
pub const EXPORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Supported export formats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Array of objects with `timestamp`, `type`, `agent`, `message`, `details`.
    Json,
    /// Header row then one row per entry.
    Csv,
    /// Human-readable block per entry.
    Text,
}

impl ExportFormat {
    /// Conventional file extension.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Text => "txt",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = AuditError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "text" | "txt" => Ok(Self::Text),
            other => Err(AuditError::UnknownFormat(other.to_string())),
        }
    }
}

/// Formats a timestamp the way exports show it.
#[must_use]
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(EXPORT_TIMESTAMP_FORMAT).to_string()
}

#[derive(Serialize)]
struct ExportRecord<'a> {
    timestamp: String,
    #[serde(rename = "type")]
    log_type: &'static str,
    agent: &'a str,
    message: &'a str,
    details: &'a Map<String, Value>,
}

impl<'a> From<&'a LogEntry> for ExportRecord<'a> {
    fn from(entry: &'a LogEntry) -> Self {
        Self {
            timestamp: format_timestamp(&entry.timestamp),
            log_type: entry.log_type.as_str(),
            agent: &entry.agent,
            message: &entry.message,
            details: &entry.details,
        }
    }
}

/// Renders `entries` in `format`, preserving their order.
pub fn export_entries(entries: &[LogEntry], format: ExportFormat) -> Result<String, AuditError> {
    match format {
        ExportFormat::Json => to_json(entries),
        ExportFormat::Csv => to_csv(entries),
        ExportFormat::Text => Ok(to_text(entries)),
    }
}

fn to_json(entries: &[LogEntry]) -> Result<String, AuditError> {
    let records: Vec<ExportRecord<'_>> = entries.iter().map(ExportRecord::from).collect();
    Ok(serde_json::to_string_pretty(&records)?)
}

fn to_csv(entries: &[LogEntry]) -> Result<String, AuditError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["Timestamp", "Type", "Agent", "Message", "Details"])?;
    for entry in entries {
        let details = Value::Object(entry.details.clone()).to_string();
        writer.write_record([
            format_timestamp(&entry.timestamp).as_str(),
            entry.log_type.as_str(),
            entry.agent.as_str(),
            entry.message.as_str(),
            details.as_str(),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| AuditError::Io(err.into_error()))?;
    String::from_utf8(bytes).map_err(|_| AuditError::Encoding)
}

fn to_text(entries: &[LogEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(
            out,
            "[{}] {} - {}",
            format_timestamp(&entry.timestamp),
            entry.log_type,
            entry.agent
        );
        let _ = writeln!(out, "  Message: {}", entry.message);
        if !entry.details.is_empty() {
            let _ = writeln!(out, "  Details:");
            for (key, value) in &entry.details {
                let _ = writeln!(out, "    {key}: {value}");
            }
        }
        out.push('\n');
    }
    out
}
