//! Exit codes and structured error output.

use serde::Serialize;

use crate::actions::ActionFatal;
use crate::pipeline::FinderError;

/// Process exit codes.
///
/// - 0: completed, duplicates found
/// - 1: general error
/// - 2: completed, no duplicates
/// - 3: completed with non-fatal errors
/// - 130: interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Scan completed and duplicates were found.
    Success = 0,
    /// An unexpected error occurred.
    GeneralError = 1,
    /// Scan completed but no duplicates were found.
    NoDuplicates = 2,
    /// Completed, but some files could not be scanned or acted on.
    PartialSuccess = 3,
    /// Interrupted by the user.
    Interrupted = 130,
}

impl ExitCode {
    /// Numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DF000",
            Self::GeneralError => "DF001",
            Self::NoDuplicates => "DF002",
            Self::PartialSuccess => "DF003",
            Self::Interrupted => "DF130",
        }
    }

    /// Exit code for an error that ended the run.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        let interrupted = err.chain().any(|cause| {
            matches!(
                cause.downcast_ref::<FinderError>(),
                Some(FinderError::Interrupted)
            )
        });
        if interrupted {
            Self::Interrupted
        } else {
            Self::GeneralError
        }
    }
}

/// Structured error for `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g. "DF001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable message, including causes
    pub message: String,
    /// Whether the run was interrupted
    pub interrupted: bool,
    /// Whether the user declined an action
    pub declined: bool,
}

impl StructuredError {
    /// Build from an error and the exit code it maps to.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
            declined: err
                .chain()
                .any(|c| matches!(c.downcast_ref::<ActionFatal>(), Some(ActionFatal::Declined(_)))),
        }
    }
}
