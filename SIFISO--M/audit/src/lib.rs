#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Append-only transparency trail for the Sifiso runtime.
//!
//! Every data read and every autonomous decision made by an agent is recorded here. The
//! log is constructed once at startup and handed to each component; it is not a global.

/// Entry model.
pub mod entry;
/// Audit failures.
pub mod error;
pub mod export;
/// The log itself.
pub mod log;
pub mod query;

pub use entry::{clamp_confidence, LogEntry, LogType};
pub use error::AuditError;
pub use export::{export_entries, format_timestamp, ExportFormat, EXPORT_TIMESTAMP_FORMAT};
pub use log::{AuditConfig, AuditLog};
pub use query::{AuditFilter, AuditStats, Page, QueryPage};
