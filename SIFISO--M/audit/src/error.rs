use thiserror::Error;

/// Audit log failures.
#[derive(Debug, Error)]
pub enum AuditError {
    /// JSON serialization failed.
    #[error("json export failed: {0}")]
    Json(#[from] serde_json::Error),
    /// CSV serialization failed.
    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),
    /// Writing an export file failed.
    #[error("export io failed: {0}")]
    Io(#[from] std::io::Error),
    /// The CSV writer produced invalid UTF-8.
    #[error("csv output was not utf-8")]
    Encoding,
    /// An entry type name was not recognized.
    #[error("unknown log type `{0}`")]
    UnknownType(String),
    /// An export format name was not recognized.
    #[error("unknown export format `{0}`")]
    UnknownFormat(String),
}
