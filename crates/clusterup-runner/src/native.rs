use crate::error::RunnerError;
use std::process::{Child, Stdio};
use std::time::Duration;
use tracing::debug;

use super::{CommandSpec, OutputMode, ProcessOutput, ProcessRunner};

// ============================================================================
// NativeRunner - Native Process Execution
// ============================================================================

/// Native process runner using `std::process::Command`.
///
/// `NativeRunner` spawns the program directly with argv-style arguments; no
/// `sh -c` is ever involved, so shell metacharacters in repository names or
/// profile names are passed through literally.
///
/// # Example
///
/// ```rust,no_run
/// use clusterup_runner::{CommandSpec, NativeRunner, ProcessRunner};
///
/// let runner = NativeRunner::new();
/// let cmd = CommandSpec::new("echo").arg("hello");
/// let output = runner.run(&cmd, None).unwrap();
/// assert!(output.success());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeRunner {
    streamed_stdout_to_stderr: bool,
}

impl NativeRunner {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            streamed_stdout_to_stderr: false,
        }
    }

    /// Send the stdout of [`OutputMode::Inherit`] commands to our stderr,
    /// keeping stdout free for a machine-readable report.
    #[must_use]
    pub const fn with_streamed_stdout_to_stderr(mut self, enabled: bool) -> Self {
        self.streamed_stdout_to_stderr = enabled;
        self
    }

    fn spawn(&self, cmd: &CommandSpec) -> Result<Child, RunnerError> {
        let mut command = cmd.to_command();
        if self.streamed_stdout_to_stderr && cmd.output == OutputMode::Inherit {
            command.stdout(Stdio::from(std::io::stderr()));
        }
        command
            .spawn()
            .map_err(|e| RunnerError::SpawnFailed {
                program: cmd.program_name(),
                reason: e.to_string(),
            })
    }

    fn collect(
        cmd: &CommandSpec,
        output: std::io::Result<std::process::Output>,
    ) -> Result<ProcessOutput, RunnerError> {
        let output = output.map_err(|e| RunnerError::WaitFailed {
            program: cmd.program_name(),
            reason: e.to_string(),
        })?;
        Ok(ProcessOutput::new(
            output.stdout,
            output.stderr,
            output.status.code(),
        ))
    }

    /// Terminate a process by its PID.
    ///
    /// On Unix, sends SIGKILL to the process. Elsewhere this is a no-op.
    fn terminate_process(pid: u32) {
        #[cfg(unix)]
        {
            // SAFETY: kill(2) with a PID we spawned and SIGKILL has no memory effects.
            unsafe {
                libc::kill(pid as i32, libc::SIGKILL);
            }
        }

        #[cfg(not(unix))]
        {
            let _ = pid;
        }
    }
}

impl ProcessRunner for NativeRunner {
    fn run(
        &self,
        cmd: &CommandSpec,
        timeout: Option<Duration>,
    ) -> Result<ProcessOutput, RunnerError> {
        use std::sync::mpsc;
        use std::thread;

        debug!(program = %cmd.program_name(), args = ?cmd.args_lossy(), "spawning process");
        let child = self.spawn(cmd)?;

        let Some(timeout) = timeout else {
            return Self::collect(cmd, child.wait_with_output());
        };

        let (tx, rx) = mpsc::channel();
        let child_id = child.id();

        let handle = thread::spawn(move || {
            let output = child.wait_with_output();
            let _ = tx.send(output);
        });

        match rx.recv_timeout(timeout) {
            Ok(output_result) => {
                let _ = handle.join();
                Self::collect(cmd, output_result)
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                Self::terminate_process(child_id);
                let _ = handle.join();

                Err(RunnerError::Timeout {
                    program: cmd.program_name(),
                    timeout_seconds: timeout.as_secs(),
                })
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(RunnerError::WaitFailed {
                program: cmd.program_name(),
                reason: "process monitoring thread terminated unexpectedly".to_string(),
            }),
        }
    }
}
