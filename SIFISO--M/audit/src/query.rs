//! Filtered, paginated and statistical read views.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::entry::{LogEntry, LogType};

/// Conjunctive entry filter. Empty fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditFilter {
    /// Accepted types; empty accepts all.
    #[serde(default)]
    pub types: Vec<LogType>,
    /// Exact agent name.
    pub agent: Option<String>,
    /// Inclusive lower time bound.
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper time bound.
    pub until: Option<DateTime<Utc>>,
    /// Case-insensitive text contained in the message or details.
    pub text: Option<String>,
}

impl AuditFilter {
    /// Filter accepting every entry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to one more type.
    #[must_use]
    pub fn with_type(mut self, log_type: LogType) -> Self {
        self.types.push(log_type);
        self
    }

    /// Restricts to one agent.
    #[must_use]
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    /// Restricts to entries at or after `since`.
    #[must_use]
    pub const fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Restricts to entries at or before `until`.
    #[must_use]
    pub const fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    /// Restricts to entries mentioning `text`.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Whether `entry` passes every restriction.
    #[must_use]
    pub fn matches(&self, entry: &LogEntry) -> bool {
        (self.types.is_empty() || self.types.contains(&entry.log_type))
            && self.agent.as_deref().map_or(true, |agent| agent == entry.agent)
            && self.since.map_or(true, |since| entry.timestamp >= since)
            && self.until.map_or(true, |until| entry.timestamp <= until)
            && self.text.as_deref().map_or(true, |text| entry.mentions(text))
    }
}

/// Zero-based page request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page {
    /// Page index.
    pub page: usize,
    /// Entries per page.
    pub page_size: usize,
}

impl Page {
    /// Page `page` of `page_size` entries (at least one).
    #[must_use]
    pub fn new(page: usize, page_size: usize) -> Self {
        Self {
            page,
            page_size: page_size.max(1),
        }
    }

    fn offset(self) -> usize {
        self.page.saturating_mul(self.page_size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(0, 50)
    }
}

/// One page of newest-first query results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPage {
    /// Entries on this page, newest first.
    pub entries: Vec<LogEntry>,
    /// Matching entries across all pages.
    pub total: usize,
    /// Requested page.
    pub page: Page,
}

impl QueryPage {
    /// Whether a following page exists.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.page.offset() + self.entries.len() < self.total
    }

    pub(crate) fn collect<'a>(
        newest_first: impl Iterator<Item = &'a LogEntry>,
        filter: &AuditFilter,
        page: Page,
    ) -> Self {
        let mut total = 0;
        let mut entries = Vec::with_capacity(page.page_size.min(256));
        for entry in newest_first.filter(|entry| filter.matches(entry)) {
            if total >= page.offset() && entries.len() < page.page_size {
                entries.push(entry.clone());
            }
            total += 1;
        }
        Self {
            entries,
            total,
            page,
        }
    }
}

/// Aggregate counts over the whole log.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuditStats {
    /// Entry count.
    pub total: usize,
    /// Count per type, in first-seen order.
    pub by_type: IndexMap<LogType, usize>,
    /// Count per agent, in first-seen order.
    pub by_agent: IndexMap<String, usize>,
    /// Oldest entry time.
    pub first: Option<DateTime<Utc>>,
    /// Newest entry time.
    pub last: Option<DateTime<Utc>>,
    /// Mean confidence across decision entries that carry one.
    pub average_confidence: Option<f64>,
}

impl AuditStats {
    pub(crate) fn collect<'a>(entries: impl Iterator<Item = &'a LogEntry>) -> Self {
        let mut stats = Self::default();
        let mut confidence_sum = 0.0;
        let mut confidence_count = 0_u32;
        for entry in entries {
            stats.total += 1;
            *stats.by_type.entry(entry.log_type).or_insert(0) += 1;
            *stats.by_agent.entry(entry.agent.clone()).or_insert(0) += 1;
            stats.first = Some(stats.first.map_or(entry.timestamp, |t| t.min(entry.timestamp)));
            stats.last = Some(stats.last.map_or(entry.timestamp, |t| t.max(entry.timestamp)));
            if entry.log_type == LogType::AiDecision {
                if let Some(confidence) = entry.confidence() {
                    confidence_sum += confidence;
                    confidence_count += 1;
                }
            }
        }
        if confidence_count > 0 {
            stats.average_confidence = Some(confidence_sum / f64::from(confidence_count));
        }
        stats
    }

    /// Count for one type.
    #[must_use]
    pub fn count(&self, log_type: LogType) -> usize {
        self.by_type.get(&log_type).copied().unwrap_or(0)
    }
}
