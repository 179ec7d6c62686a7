//! Error types for the reconciliation engine.

use thiserror::Error;

/// Main error type for diff operations.
#[derive(Error, Debug)]
pub enum DiffError {
    /// Configuration error (malformed URL, missing selection, bad YAML values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Initial connect or ping failed for one side.
    #[error("Connection to {side} failed: {message}")]
    Connection { side: String, message: String },

    /// Metadata for a table could not be read or parsed.
    #[error("Schema read failed for table {table}: {message}")]
    SchemaRead { table: String, message: String },

    /// Table does not exist on one side.
    #[error("Table {table} not found on {side}")]
    TableNotFound { table: String, side: String },

    /// Query error from the database driver.
    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),

    /// A column value could not be decoded into a typed value.
    #[error("Failed to decode column {column} of {table}: {message}")]
    Decode {
        table: String,
        column: String,
        message: String,
    },

    /// A single query attempt exceeded its deadline.
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    /// A transient failure persisted through every retry attempt.
    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },

    /// A keyed operation was requested on a table without a comparison key.
    #[error("Table {0} has no primary key or NOT NULL unique index")]
    NoComparisonKey(String),

    /// IO error (config file, report file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The comparison was cancelled (fail-fast or signal).
    #[error("Comparison cancelled")]
    Cancelled,

    /// A table task panicked or was torn down unexpectedly.
    #[error("Table task failed: {0}")]
    TaskFailed(String),
}

impl DiffError {
    /// Create a Connection error for the given side.
    pub fn connection(side: impl Into<String>, message: impl ToString) -> Self {
        DiffError::Connection {
            side: side.into(),
            message: message.to_string(),
        }
    }

    /// Create a SchemaRead error.
    pub fn schema_read(table: impl Into<String>, message: impl ToString) -> Self {
        DiffError::SchemaRead {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a Decode error.
    pub fn decode(table: impl Into<String>, column: impl Into<String>, message: impl ToString) -> Self {
        DiffError::Decode {
            table: table.into(),
            column: column.into(),
            message: message.to_string(),
        }
    }

    /// Whether the failure may go away if the operation is retried.
    ///
    /// Timeouts and connection-level driver errors are transient. Query syntax
    /// errors, decode failures and missing tables are not.
    pub fn is_transient(&self) -> bool {
        match self {
            DiffError::Timeout { .. } => true,
            DiffError::Query(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::Protocol(_)
                    | sqlx::Error::WorkerCrashed
            ),
            _ => false,
        }
    }

    /// Whether this error must abort the whole run rather than one table.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DiffError::Config(_) | DiffError::Connection { .. } | DiffError::Cancelled
        )
    }

    /// Process exit code for this error.
    ///
    /// Only configuration problems exit non-zero; everything else is reported
    /// through the `false` verdict.
    pub fn exit_code(&self) -> u8 {
        match self {
            DiffError::Config(_) | DiffError::Yaml(_) | DiffError::Io(_) => 1,
            _ => 0,
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
}

/// Result type alias for diff operations.
pub type Result<T> = std::result::Result<T, DiffError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let timeout = DiffError::Timeout {
            operation: "checksum".into(),
            secs: 30,
        };
        assert!(timeout.is_transient());
        assert!(DiffError::Query(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!DiffError::Query(sqlx::Error::RowNotFound).is_transient());
        assert!(!DiffError::schema_read("d1.t1", "boom").is_transient());
        assert!(!DiffError::Config("bad".into()).is_transient());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(DiffError::Config("missing url2".into()).exit_code(), 1);
        assert_eq!(DiffError::connection("url1", "refused").exit_code(), 0);
        assert_eq!(DiffError::Cancelled.exit_code(), 0);
    }

    #[test]
    fn test_fatal_classification() {
        assert!(DiffError::connection("url2", "refused").is_fatal());
        assert!(!DiffError::schema_read("d1.t1", "missing").is_fatal());
    }

    #[test]
    fn test_format_detailed_includes_message() {
        let err = DiffError::schema_read("d1.t1", "no such table");
        let text = err.format_detailed();
        assert!(text.starts_with("Error: Schema read failed for table d1.t1"));
    }
}
