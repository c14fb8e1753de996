//! Error types for the series store.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur while loading, querying or mutating the store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backing file missing, unreadable or malformed
    #[error("Failed to load records from {}: {reason}", .path.display())]
    Load { path: PathBuf, reason: String },

    /// CSV parsing error
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// Row that could not be turned into a record
    #[error("Invalid record at row {row}: {message}")]
    InvalidRecord { row: usize, message: String },

    /// Two rows share the same id
    #[error("Duplicate id {id} at row {row}")]
    DuplicateId { id: u64, row: usize },

    /// Field names outside the schema
    #[error("Invalid fields: {}", fields.join(", "))]
    InvalidField { fields: Vec<String> },

    /// Required fields absent from a create request
    #[error("Missing required fields: {}", fields.join(", "))]
    MissingField { fields: Vec<String> },

    /// Value that cannot be coerced to the field's type
    #[error("Invalid value for field '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// No record carries the requested id
    #[error("Serie {id} not found")]
    NotFound { id: u64 },

    /// No id left to assign after the current maximum
    #[error("No ids left to assign")]
    IdExhausted,

    /// Rewriting the backing file failed; the mutation was rolled back
    #[error("Failed to persist records to {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A thread panicked while holding the store lock
    #[error("Store lock poisoned during {0}")]
    LockPoisoned(&'static str),

    /// Failed to open or read a file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing command-line argument
    #[error("Missing argument: {0}. Usage: series-store [--data <path>] <command> [args]")]
    MissingArgument(&'static str),

    /// Malformed command-line argument
    #[error("Invalid argument '{value}': {message}")]
    InvalidArgument { value: String, message: String },
}

impl StoreError {
    /// Returns `true` for errors the caller caused and can correct.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidField { .. }
                | StoreError::MissingField { .. }
                | StoreError::InvalidValue { .. }
                | StoreError::NotFound { .. }
                | StoreError::Json(_)
        )
    }
}
