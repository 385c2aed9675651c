use crate::error::RunnerError;
use std::time::Duration;

use super::CommandSpec;

// ============================================================================
// ProcessRunner Trait - Process Execution Interface
// ============================================================================

/// Output from a process execution.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// Standard output from the process (empty when output was inherited)
    pub stdout: Vec<u8>,
    /// Standard error from the process (empty when output was inherited)
    pub stderr: Vec<u8>,
    /// Exit code from the process (None if terminated by signal)
    pub exit_code: Option<i32>,
}

impl ProcessOutput {
    /// Create a new `ProcessOutput` with the given values.
    #[must_use]
    pub fn new(stdout: Vec<u8>, stderr: Vec<u8>, exit_code: Option<i32>) -> Self {
        Self {
            stdout,
            stderr,
            exit_code,
        }
    }

    /// A successful exit with the given stdout.
    #[must_use]
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self::new(stdout.into(), Vec::new(), Some(0))
    }

    /// A failed exit with the given code and stderr.
    #[must_use]
    pub fn failed(code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self::new(Vec::new(), stderr.into(), Some(code))
    }

    /// Get stdout as a UTF-8 string, lossy conversion.
    #[must_use]
    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as a UTF-8 string, lossy conversion.
    #[must_use]
    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    /// stdout followed by stderr, the way `2>&1` would interleave a tool that
    /// writes its diagnostics last.
    #[must_use]
    pub fn combined_string(&self) -> String {
        let mut combined = self.stdout_string();
        combined.push_str(&self.stderr_string());
        combined
    }

    /// Check if the process exited successfully (exit code 0).
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Exit code for error reporting; signal termination reports as -1.
    #[must_use]
    pub fn code_or_signal(&self) -> i32 {
        self.exit_code.unwrap_or(-1)
    }
}

/// Trait for process execution.
///
/// Implementations MUST use argv-style APIs only (no shell string evaluation).
/// The interface is synchronous: each provisioning step blocks until its tool
/// exits.
///
/// `timeout` of `None` waits indefinitely.
///
/// # Example
///
/// ```rust
/// use clusterup_runner::{CommandSpec, ProcessOutput, ProcessRunner, RunnerError};
/// use std::time::Duration;
///
/// struct AlwaysOk;
///
/// impl ProcessRunner for AlwaysOk {
///     fn run(
///         &self,
///         _cmd: &CommandSpec,
///         _timeout: Option<Duration>,
///     ) -> Result<ProcessOutput, RunnerError> {
///         Ok(ProcessOutput::ok("done"))
///     }
/// }
///
/// let output = AlwaysOk.run(&CommandSpec::new("terraform"), None).unwrap();
/// assert!(output.success());
/// ```
pub trait ProcessRunner: Send + Sync {
    /// Execute a command, waiting at most `timeout` if one is given.
    ///
    /// * `Ok(ProcessOutput)` - The process completed (possibly with non-zero exit code)
    /// * `Err(RunnerError::Timeout)` - The process timed out and was killed
    /// * `Err(RunnerError::*)` - The process could not be started or awaited
    fn run(
        &self,
        cmd: &CommandSpec,
        timeout: Option<Duration>,
    ) -> Result<ProcessOutput, RunnerError>;
}
