//! # Error Types
//!
//! Structured error types for rate_core. The calculation functions never
//! fail; these errors come from the edges: user input that is neither blank
//! nor numeric, unknown panel/row ids, formula rejections surfaced by the
//! session, and the persistence medium.
//!
//! ## Example
//!
//! ```rust
//! use rate_core::errors::{RateError, RateResult};
//!
//! fn validate_scale(scale: f64) -> RateResult<()> {
//!     if !scale.is_finite() {
//!         return Err(RateError::invalid_input(
//!             "uiScale",
//!             scale.to_string(),
//!             "Scale must be a finite number",
//!         ));
//!     }
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for rate_core operations
pub type RateResult<T> = Result<T, RateError>;

/// Structured error type for session and storage operations.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum RateError {
    /// An input value is invalid (not numeric, out of range, unknown name)
    #[error("Invalid input for '{field}': {value} - {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    /// No panel with this id
    #[error("Panel not found: {panel_id}")]
    PanelNotFound { panel_id: String },

    /// No row with this id in the panel
    #[error("Row not found: {row_id} in panel {panel_id}")]
    RowNotFound { panel_id: String, row_id: String },

    /// Formula text was rejected by the evaluator
    #[error("Invalid formula '{formula}': {reason}")]
    InvalidFormula { formula: String, reason: String },

    /// Operation belongs to the other commission-derivation mode
    #[error("Panel {panel_id} is in {mode} mode - {reason}")]
    CommissionModeConflict {
        panel_id: String,
        mode: String,
        reason: String,
    },

    /// Key-value store I/O error
    #[error("Storage error: {operation} on '{target}' - {reason}")]
    StorageError {
        operation: String,
        target: String,
        reason: String,
    },

    /// The store file is locked by another process
    #[error("Store locked: '{path}' is locked by {locked_by} since {locked_at}")]
    StoreLocked {
        path: String,
        locked_by: String,
        locked_at: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },

    /// Persisted schema version is newer than this build understands
    #[error("Version mismatch: stored schema {found}, supported up to {supported}")]
    VersionMismatch { found: u32, supported: u32 },

    /// Persisted payload does not have the expected structural shape
    #[error("Malformed document: {reason}")]
    MalformedDocument { reason: String },
}

impl RateError {
    /// Create an InvalidInput error
    pub fn invalid_input(field: impl Into<String>, value: impl Into<String>, reason: impl Into<String>) -> Self {
        RateError::InvalidInput {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a PanelNotFound error
    pub fn panel_not_found(panel_id: impl Into<String>) -> Self {
        RateError::PanelNotFound {
            panel_id: panel_id.into(),
        }
    }

    /// Create a RowNotFound error
    pub fn row_not_found(panel_id: impl Into<String>, row_id: impl Into<String>) -> Self {
        RateError::RowNotFound {
            panel_id: panel_id.into(),
            row_id: row_id.into(),
        }
    }

    /// Create an InvalidFormula error
    pub fn invalid_formula(formula: impl Into<String>, reason: impl Into<String>) -> Self {
        RateError::InvalidFormula {
            formula: formula.into(),
            reason: reason.into(),
        }
    }

    /// Create a StorageError
    pub fn storage(operation: impl Into<String>, target: impl Into<String>, reason: impl Into<String>) -> Self {
        RateError::StorageError {
            operation: operation.into(),
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Create a MalformedDocument error
    pub fn malformed(reason: impl Into<String>) -> Self {
        RateError::MalformedDocument {
            reason: reason.into(),
        }
    }

    /// Check if this is a recoverable error (e.g., can retry)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RateError::StoreLocked { .. })
    }

    /// Get a short error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            RateError::InvalidInput { .. } => "INVALID_INPUT",
            RateError::PanelNotFound { .. } => "PANEL_NOT_FOUND",
            RateError::RowNotFound { .. } => "ROW_NOT_FOUND",
            RateError::InvalidFormula { .. } => "INVALID_FORMULA",
            RateError::CommissionModeConflict { .. } => "COMMISSION_MODE_CONFLICT",
            RateError::StorageError { .. } => "STORAGE_ERROR",
            RateError::StoreLocked { .. } => "STORE_LOCKED",
            RateError::SerializationError { .. } => "SERIALIZATION_ERROR",
            RateError::VersionMismatch { .. } => "VERSION_MISMATCH",
            RateError::MalformedDocument { .. } => "MALFORMED_DOCUMENT",
        }
    }
}

impl From<serde_json::Error> for RateError {
    fn from(e: serde_json::Error) -> Self {
        RateError::SerializationError {
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let error = RateError::invalid_input("basicRate", "abc", "Not a number");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("\"type\":\"InvalidInput\""));
        let roundtrip: RateError = serde_json::from_str(&json).unwrap();
        assert_eq!(error, roundtrip);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(RateError::panel_not_found("p").error_code(), "PANEL_NOT_FOUND");
        assert_eq!(RateError::row_not_found("p", "r").error_code(), "ROW_NOT_FOUND");
        assert_eq!(RateError::invalid_formula("2+", "trailing operator").error_code(), "INVALID_FORMULA");
    }

    #[test]
    fn test_only_lock_is_recoverable() {
        let locked = RateError::StoreLocked {
            path: "ratecalc.json".to_string(),
            locked_by: "pid 42".to_string(),
            locked_at: "now".to_string(),
        };
        assert!(locked.is_recoverable());
        assert!(!RateError::malformed("not a list").is_recoverable());
    }
}
