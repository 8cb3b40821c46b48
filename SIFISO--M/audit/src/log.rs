use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::entry::{clamp_confidence, details_from, LogEntry, LogType};
use crate::error::AuditError;
use crate::export::{export_entries, ExportFormat};
use crate::query::{AuditFilter, AuditStats, Page, QueryPage};

/// Audit log tunables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuditConfig {
    /// Maximum entries returned by [`AuditLog::recent`].
    pub recent_window: usize,
    /// Entries older than this many days are dropped by [`AuditLog::apply_retention`].
    pub retention_days: Option<u32>,
    /// How often a running service applies retention.
    pub retention_interval_secs: u64,
    /// Per-subscriber buffer of live entries.
    pub subscriber_buffer: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            recent_window: 100,
            retention_days: None,
            retention_interval_secs: 3_600,
            subscriber_buffer: 256,
        }
    }
}

impl AuditConfig {
    /// Period between retention passes.
    #[must_use]
    pub fn retention_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.retention_interval_secs.max(1))
    }
}

#[derive(Debug)]
struct LogState {
    entries: Vec<LogEntry>,
    next_seq: u64,
}

#[derive(Debug)]
struct AuditInner {
    config: AuditConfig,
    state: Mutex<LogState>,
    live: broadcast::Sender<LogEntry>,
}

/// Process-wide append-only transparency log. Cheap to clone; clones share one log.
///
/// Appends are serialized under a single lock that also assigns the sequence number, so
/// entries are totally ordered by insertion regardless of how many agents write.
#[derive(Debug, Clone)]
pub struct AuditLog {
    inner: Arc<AuditInner>,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(AuditConfig::default())
    }
}

impl AuditLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new(config: AuditConfig) -> Self {
        let (live, _) = broadcast::channel(config.subscriber_buffer.max(1));
        Self {
            inner: Arc::new(AuditInner {
                config,
                state: Mutex::new(LogState {
                    entries: Vec::new(),
                    next_seq: 1,
                }),
                live,
            }),
        }
    }

    /// Log configuration.
    #[must_use]
    pub fn config(&self) -> &AuditConfig {
        &self.inner.config
    }

    /// Appends an entry and returns it.
    pub fn log(
        &self,
        log_type: LogType,
        agent: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> LogEntry {
        let agent = agent.into();
        let message = message.into();
        let details = details_from(details);
        let entry = {
            let mut state = self.inner.state.lock();
            let entry = LogEntry {
                seq: state.next_seq,
                timestamp: Utc::now(),
                log_type,
                agent,
                message,
                details,
            };
            state.next_seq += 1;
            state.entries.push(entry.clone());
            // Sent under the lock so live subscribers observe insertion order.
            let _ = self.inner.live.send(entry.clone());
            entry
        };
        debug!(seq = entry.seq, kind = %entry.log_type, agent = %entry.agent, "audit.append");
        entry
    }

    /// Records a read of personal data and why it was needed.
    pub fn data_access(
        &self,
        agent: impl Into<String>,
        data_type: &str,
        purpose: &str,
    ) -> LogEntry {
        self.log(
            LogType::DataAccess,
            agent,
            format!("Accessed {data_type}"),
            json!({ "data_type": data_type, "purpose": purpose }),
        )
    }

    /// Records an autonomous decision with its reasoning. Confidence is clamped to [0, 1].
    pub fn decision(
        &self,
        agent: impl Into<String>,
        decision: &str,
        reasoning: &str,
        confidence: f64,
    ) -> LogEntry {
        self.decision_with(agent, decision, reasoning, confidence, Value::Null)
    }

    /// Like [`Self::decision`] with extra structured context merged into the details.
    pub fn decision_with(
        &self,
        agent: impl Into<String>,
        decision: &str,
        reasoning: &str,
        confidence: f64,
        context: Value,
    ) -> LogEntry {
        let mut details = details_from(context);
        details.insert("decision".into(), Value::from(decision));
        details.insert("reasoning".into(), Value::from(reasoning));
        details.insert(
            "confidence".into(),
            Value::from(clamp_confidence(confidence)),
        );
        self.log(
            LogType::AiDecision,
            agent,
            decision,
            Value::Object(details),
        )
    }

    /// Records a lifecycle or failure event.
    pub fn system_event(
        &self,
        agent: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> LogEntry {
        self.log(LogType::SystemEvent, agent, message, details)
    }

    /// Records a user response to something the runtime produced.
    pub fn user_interaction(
        &self,
        agent: impl Into<String>,
        action: impl Into<String>,
        details: Value,
    ) -> LogEntry {
        self.log(LogType::UserInteraction, agent, action, details)
    }

    /// Records a privacy-relevant condition such as a missing permission.
    pub fn privacy_event(
        &self,
        agent: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> LogEntry {
        self.log(LogType::PrivacyEvent, agent, message, details)
    }

    /// Up to `recent_window` entries, newest first.
    #[must_use]
    pub fn recent(&self) -> Vec<LogEntry> {
        self.recent_limit(self.inner.config.recent_window)
    }

    /// Up to `limit` entries (never more than `recent_window`), newest first.
    #[must_use]
    pub fn recent_limit(&self, limit: usize) -> Vec<LogEntry> {
        let limit = limit.min(self.inner.config.recent_window);
        let state = self.inner.state.lock();
        state.entries.iter().rev().take(limit).cloned().collect()
    }

    /// Full history in insertion order.
    #[must_use]
    pub fn all(&self) -> Vec<LogEntry> {
        self.inner.state.lock().entries.clone()
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Newest-first page of entries matching `filter`.
    #[must_use]
    pub fn query(&self, filter: &AuditFilter, page: Page) -> QueryPage {
        let snapshot = self.all();
        QueryPage::collect(snapshot.iter().rev(), filter, page)
    }

    /// Aggregates over the full history.
    #[must_use]
    pub fn stats(&self) -> AuditStats {
        let snapshot = self.all();
        AuditStats::collect(snapshot.iter())
    }

    /// Drops entries older than `cutoff`; returns how many were removed.
    pub fn purge_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let purged = {
            let mut state = self.inner.state.lock();
            let before = state.entries.len();
            state.entries.retain(|entry| entry.timestamp >= cutoff);
            before - state.entries.len()
        };
        if purged > 0 {
            info!(purged, cutoff = %cutoff, "audit.purged");
        }
        purged
    }

    /// Applies the configured retention period relative to `now`.
    pub fn apply_retention(&self, now: DateTime<Utc>) -> usize {
        self.inner
            .config
            .retention_days
            .map_or(0, |days| self.purge_older_than(now - Duration::days(i64::from(days))))
    }

    /// Live feed of entries appended after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.inner.live.subscribe()
    }

    /// Full history rendered in `format`, oldest first.
    pub fn export(&self, format: ExportFormat) -> Result<String, AuditError> {
        export_entries(&self.all(), format)
    }

    /// Writes [`Self::export`] output to `path`.
    pub fn export_to_file(
        &self,
        path: impl AsRef<Path>,
        format: ExportFormat,
    ) -> Result<usize, AuditError> {
        let entries = self.all();
        let rendered = export_entries(&entries, format)?;
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, rendered)?;
        info!(path = %path.display(), entries = entries.len(), "audit.exported");
        Ok(entries.len())
    }
}
