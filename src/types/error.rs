//! Error types for connector operations.
//!
//! Uses `thiserror` for ergonomic error definitions with automatic `From` implementations.

use thiserror::Error;

/// Error type for all connector operations.
///
/// Usage errors (bad `if_exists` value, existing table under `fail`, empty
/// table on create, malformed names) are raised before any mutation reaches
/// the database. Driver errors surface unchanged after the enclosing
/// transaction has been rolled back.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// `if_exists` outside `fail | append | drop | truncate`
    #[error("Invalid value for `if_exists` argument: {0}")]
    InvalidIfExists(String),

    /// Destination exists and policy is `fail`
    #[error("Table already exists: {0}")]
    TableExists(String),

    /// Cannot infer a schema from zero rows
    #[error("Table is empty. Must have 1 or more rows: {0}")]
    EmptyTable(String),

    /// Malformed table or schema name
    #[error("Invalid table name: {0}")]
    InvalidName(String),

    /// Table shape or argument validation failed
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// SQLite driver error
    #[error("SQLite error: {0}")]
    Driver(#[from] rusqlite::Error),

    /// Spooled artifact is corrupt or truncated
    #[error("Spool error: {0}")]
    SpoolError(String),

    /// CSV export/import error
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DatabaseError {
    /// Create a validation error with context.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a spool error with context.
    pub fn spool(msg: impl Into<String>) -> Self {
        Self::SpoolError(msg.into())
    }

    /// Check if the error is a caller mistake rather than a store failure.
    ///
    /// # Returns
    ///
    /// `true` if retrying without changing arguments cannot succeed
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidIfExists(_)
                | Self::TableExists(_)
                | Self::EmptyTable(_)
                | Self::InvalidName(_)
                | Self::ValidationError(_)
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DatabaseError>;
