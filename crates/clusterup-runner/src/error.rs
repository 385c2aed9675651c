//! Error types for process execution

use thiserror::Error;

/// Failures to start or supervise an external process.
///
/// A process that runs and exits non-zero is not a `RunnerError`; callers
/// inspect [`ProcessOutput::exit_code`](crate::ProcessOutput::exit_code) for that.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Failed to spawn '{program}': {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("Failed to wait for '{program}': {reason}")]
    WaitFailed { program: String, reason: String },

    #[error("'{program}' timed out after {timeout_seconds} seconds")]
    Timeout {
        program: String,
        timeout_seconds: u64,
    },
}

impl RunnerError {
    /// Program name the error refers to.
    #[must_use]
    pub fn program(&self) -> &str {
        match self {
            Self::SpawnFailed { program, .. }
            | Self::WaitFailed { program, .. }
            | Self::Timeout { program, .. } => program,
        }
    }
}
