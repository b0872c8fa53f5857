//! Error types for dump anonymization.
//!
//! Structural problems in the dump (bad DDL, rows that do not tokenize to the
//! declared column count) and invalid change requests are fatal. Rules that
//! point at tables without schema or without rows are skip conditions: the
//! engine logs them and records them in the run statistics instead.

use thiserror::Error;

/// Main error type for anonymization runs.
#[derive(Debug, Error)]
pub enum AnonymizeError {
    /// A `CREATE TABLE` block or constraint line could not be parsed
    #[error("schema parse error in table '{table}' at line {line}: {message}")]
    SchemaParse {
        table: String,
        line: usize,
        message: String,
    },

    /// A change request names a table the schema does not contain
    #[error("unknown table '{table}'")]
    UnknownTable { table: String },

    /// A change request names a column the table does not contain
    #[error("unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },

    /// An INSERT has no column list and the table has no schema to fall back on
    #[error("INSERT into '{table}' at line {line} has no column list and no CREATE TABLE")]
    MissingColumnList { table: String, line: usize },

    /// A row tokenized to a different number of fields than declared columns
    #[error(
        "row {row} of INSERT into '{table}' at line {line} has {found} fields, expected {expected}"
    )]
    TokenizationMismatch {
        table: String,
        line: usize,
        row: usize,
        expected: usize,
        found: usize,
    },

    /// Invalid change request (mutually exclusive options, bad regex, ...)
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Change request file could not be deserialized
    #[error("failed to parse configuration {context}")]
    ConfigParse {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// I/O operation failed
    #[error("I/O operation failed: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience type alias for Results with AnonymizeError
pub type Result<T> = std::result::Result<T, AnonymizeError>;

impl AnonymizeError {
    /// Creates a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Wraps an I/O error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
