//! Unified error type and stable exit codes for the CLI.
//!
//! Subsystem errors are bridged into `SiftError` via `From` impls before
//! being rendered on the CLI surface. `OutputErrorCode` gives every failure
//! class a stable integer that doubles as the process exit code:
//!
//! - `2`: invalid arguments (bad input from the caller)
//! - `3`: setup failure (error bank or metadata could not be built)
//! - `4`: preparation failure (candidate list could not be derived)
//! - `10`: internal errors (bugs, unexpected state)

use std::fmt;

use thiserror::Error;

use crate::bank::BankError;
use crate::metadata::MetadataError;
use crate::prepare::PrepareError;
use crate::report::ReportError;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Stable integer codes for CLI exit status and JSON error output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from the caller.
    InvalidArguments = 2,
    /// One-time setup failed (bank construction, metadata load).
    SetupError = 3,
    /// Preparation failed (candidate conversion, initial build).
    PrepareError = 4,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Canonical error type for the CLI surface.
#[derive(Debug, Error)]
pub enum SiftError {
    /// Invalid arguments from the caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// The error bank could not be constructed.
    #[error(transparent)]
    Bank(#[from] BankError),

    /// The relationship graphs could not be loaded.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// The candidate list could not be prepared.
    #[error(transparent)]
    Prepare(#[from] PrepareError),

    /// Reports could not be persisted or restored.
    #[error(transparent)]
    Report(#[from] ReportError),

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl SiftError {
    /// Create an invalid arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        SiftError::InvalidArguments {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        SiftError::Internal {
            message: message.into(),
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

impl From<&SiftError> for OutputErrorCode {
    fn from(err: &SiftError) -> Self {
        match err {
            SiftError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            SiftError::Bank(_) => OutputErrorCode::SetupError,
            SiftError::Metadata(_) => OutputErrorCode::SetupError,
            SiftError::Prepare(_) => OutputErrorCode::PrepareError,
            SiftError::Report(_) => OutputErrorCode::InternalError,
            SiftError::Internal { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<serde_json::Error> for SiftError {
    fn from(err: serde_json::Error) -> Self {
        SiftError::Internal {
            message: format!("JSON error: {err}"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn code_values_are_stable() {
        assert_eq!(OutputErrorCode::InvalidArguments.code(), 2);
        assert_eq!(OutputErrorCode::SetupError.code(), 3);
        assert_eq!(OutputErrorCode::PrepareError.code(), 4);
        assert_eq!(OutputErrorCode::InternalError.code(), 10);
    }

    #[test]
    fn setup_failures_map_to_setup_error() {
        let err = SiftError::from(BankError::GroupTotalsDisagree {
            by_class: 2,
            by_method: 3,
        });
        assert_eq!(err.error_code(), OutputErrorCode::SetupError);

        let err = SiftError::from(MetadataError::Missing {
            path: PathBuf::from("call_graph.csv"),
        });
        assert_eq!(err.error_code(), OutputErrorCode::SetupError);
    }

    #[test]
    fn invalid_arguments_map_to_invalid_arguments() {
        let err = SiftError::invalid_args("missing --build-command");
        assert_eq!(err.error_code(), OutputErrorCode::InvalidArguments);
        assert_eq!(
            err.to_string(),
            "invalid arguments: missing --build-command"
        );
    }

    #[test]
    fn display_shows_code() {
        assert_eq!(format!("{}", OutputErrorCode::SetupError), "3");
        assert_eq!(format!("{}", OutputErrorCode::InternalError), "10");
    }
}
