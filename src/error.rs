//! Structured error handling and exit codes.

use serde::Serialize;

/// Process exit codes.
///
/// - 0: Success (completed normally)
/// - 1: General error (unexpected failure)
/// - 2: No duplicates found (duplicate scan completed, nothing to report)
/// - 3: Partial success (some files or pairs failed, the rest completed)
/// - 4: Invalid rule set (rejected before any file was classified)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NoDuplicates = 2,
    PartialSuccess = 3,
    InvalidRules = 4,
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "MA000",
            Self::GeneralError => "MA001",
            Self::NoDuplicates => "MA002",
            Self::PartialSuccess => "MA003",
            Self::InvalidRules => "MA004",
            Self::Interrupted => "MA130",
        }
    }

    /// Exit code for a fatal error, looking through the `anyhow` chain for
    /// the library errors that have their own code.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(crate::duplicates::FinderError::Interrupted) = cause.downcast_ref() {
                return Self::Interrupted;
            }
            if let Some(crate::rules::RuleSetError::Invalid { .. }) = cause.downcast_ref() {
                return Self::InvalidRules;
            }
        }
        Self::GeneralError
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "MA001")
    pub code: String,
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    pub interrupted: bool,
    /// Individual problems, for errors that collect several
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub problems: Vec<String>,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        let problems = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<crate::rules::RuleSetError>())
            .map(|e| e.problems().to_vec())
            .unwrap_or_default();
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{:#}", err),
            interrupted: exit_code == ExitCode::Interrupted,
            problems,
        }
    }

    /// Serialize to a single JSON line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
