//! # Error Types
//!
//! Structured error types for windload_core. Fatal problems (bad caller
//! tables, broken invariants, store failures) are reported through
//! [`LoadError`]. Entities that simply cannot be resolved (a section for an
//! element, a pressure for a category) are not errors: they are recorded as
//! [`crate::summary::LookupGap`] values and surface in the run summary.
//!
//! ## Example
//!
//! ```rust
//! use windload_core::errors::{LoadError, LoadResult};
//!
//! fn validate_ceiling(ceiling: usize) -> LoadResult<()> {
//!     if ceiling == 0 {
//!         return Err(LoadError::validation(
//!             "apply_options",
//!             None,
//!             "max_records_per_batch",
//!             "0",
//!             "Ceiling must be at least 1",
//!         ));
//!     }
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for windload_core operations
pub type LoadResult<T> = Result<T, LoadError>;

/// Structured error type for load generation and application.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum LoadError {
    /// A caller table is missing a required field
    #[error("Schema error in {table}: missing required field '{field}'{}", row_suffix(.row))]
    Schema {
        table: String,
        row: Option<usize>,
        field: String,
    },

    /// A value breaks a structural invariant (angle-set mismatch, non-numeric cell, bad axis)
    #[error(
        "Validation error in {table}{}: field '{field}' = {value} - {reason}",
        row_suffix(.row)
    )]
    Validation {
        table: String,
        row: Option<usize>,
        field: String,
        value: String,
        reason: String,
    },

    /// Communication with the external load store failed
    #[error("Store error during {operation}: {reason} ({batches_completed} batches, {records_sent} records already written)")]
    Store {
        operation: String,
        reason: String,
        batches_completed: usize,
        records_sent: usize,
    },

    /// File I/O error
    #[error("File error: {operation} on '{path}' - {reason}")]
    FileError {
        operation: String,
        path: String,
        reason: String,
    },

    /// File is locked by another user/process
    #[error("File locked: '{path}' is locked by {locked_by} since {locked_at}")]
    FileLocked {
        path: String,
        locked_by: String,
        locked_at: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },

    /// Schema version mismatch
    #[error("Version mismatch: file version {file_version}, expected {expected_version}")]
    VersionMismatch {
        file_version: String,
        expected_version: String,
    },

    /// Generic internal error (should be rare)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn row_suffix(row: &Option<usize>) -> String {
    match row {
        Some(r) => format!(" (row {})", r),
        None => String::new(),
    }
}

impl LoadError {
    /// Create a Schema error
    pub fn schema(table: impl Into<String>, row: Option<usize>, field: impl Into<String>) -> Self {
        LoadError::Schema {
            table: table.into(),
            row,
            field: field.into(),
        }
    }

    /// Create a Validation error
    pub fn validation(
        table: impl Into<String>,
        row: Option<usize>,
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        LoadError::Validation {
            table: table.into(),
            row,
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a Store error
    pub fn store(
        operation: impl Into<String>,
        reason: impl Into<String>,
        batches_completed: usize,
        records_sent: usize,
    ) -> Self {
        LoadError::Store {
            operation: operation.into(),
            reason: reason.into(),
            batches_completed,
            records_sent,
        }
    }

    /// Create a FileError
    pub fn file_error(
        operation: impl Into<String>,
        path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        LoadError::FileError {
            operation: operation.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a FileLocked error
    pub fn file_locked(
        path: impl Into<String>,
        locked_by: impl Into<String>,
        locked_at: impl Into<String>,
    ) -> Self {
        LoadError::FileLocked {
            path: path.into(),
            locked_by: locked_by.into(),
            locked_at: locked_at.into(),
        }
    }

    /// Create a SerializationError
    pub fn serialization(reason: impl Into<String>) -> Self {
        LoadError::SerializationError {
            reason: reason.into(),
        }
    }

    /// Check if this is a recoverable error (e.g., can retry)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LoadError::FileLocked { .. } | LoadError::Store { .. })
    }

    /// Whether the error was raised before any store interaction
    pub fn is_input_error(&self) -> bool {
        matches!(self, LoadError::Schema { .. } | LoadError::Validation { .. })
    }

    /// Get a short error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            LoadError::Schema { .. } => "SCHEMA_ERROR",
            LoadError::Validation { .. } => "VALIDATION_ERROR",
            LoadError::Store { .. } => "STORE_ERROR",
            LoadError::FileError { .. } => "FILE_ERROR",
            LoadError::FileLocked { .. } => "FILE_LOCKED",
            LoadError::SerializationError { .. } => "SERIALIZATION_ERROR",
            LoadError::VersionMismatch { .. } => "VERSION_MISMATCH",
            LoadError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let error =
            LoadError::validation("coefficients", Some(2), "angle", "17", "not a control angle");
        let json = serde_json::to_string(&error).unwrap();
        let roundtrip: LoadError = serde_json::from_str(&json).unwrap();
        assert_eq!(error, roundtrip);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(LoadError::schema("cases", None, "angle").error_code(), "SCHEMA_ERROR");
        assert_eq!(LoadError::store("write_batch", "timeout", 1, 10).error_code(), "STORE_ERROR");
    }

    #[test]
    fn test_messages_name_row_and_field() {
        let msg =
            LoadError::validation("cases", Some(3), "angle", "abc", "not numeric").to_string();
        assert!(msg.contains("row 3"));
        assert!(msg.contains("angle"));
        assert!(msg.contains("abc"));

        let msg = LoadError::schema("plan", None, "load_case").to_string();
        assert!(!msg.contains("row"));
    }

    #[test]
    fn test_recoverable_and_input_errors() {
        assert!(LoadError::store("write_batch", "down", 0, 0).is_recoverable());
        assert!(!LoadError::schema("plan", None, "line_load").is_recoverable());
        assert!(LoadError::schema("plan", None, "line_load").is_input_error());
    }
}
