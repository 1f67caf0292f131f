//! Error types for the sync library.

use thiserror::Error;

/// Main error type for sync operations.
///
/// Per-record upsert failures never appear here: they are contained in
/// the record's [`SyncOutcome`](crate::sync::SyncOutcome) and the run
/// continues. Everything below is fatal to the run.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source database connection or query error
    #[error("Source database error: {0}")]
    Source(#[from] tiberius::error::Error),

    /// Extraction failure not carried by a driver error (e.g. timeout)
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Target database error outside a record's transaction
    #[error("Target database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl Into<String>, context: impl Into<String>) -> Self {
        SyncError::Pool {
            message: message.into(),
            context: context.into(),
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            SyncError::Config(_) | SyncError::Yaml(_) | SyncError::Json(_) => 1,
            SyncError::Source(_) | SyncError::Extraction(_) => 2,
            SyncError::Target(_) | SyncError::Pool { .. } => 3,
            SyncError::Io(_) => 7,
        }
    }
}

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_exit_code() {
        assert_eq!(SyncError::Config("bad".into()).exit_code(), 1);
    }

    #[test]
    fn test_io_error_exit_code() {
        let err = SyncError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        assert_eq!(err.exit_code(), 7);
    }

    #[test]
    fn test_extraction_error_exit_code() {
        assert_eq!(SyncError::Extraction("timed out".into()).exit_code(), 2);
    }

    #[test]
    fn test_format_detailed_includes_message() {
        let err = SyncError::Config("source.host is required".into());
        let detailed = err.format_detailed();
        assert!(detailed.contains("Error:"));
        assert!(detailed.contains("source.host is required"));
    }
}
