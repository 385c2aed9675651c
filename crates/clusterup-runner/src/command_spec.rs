use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, Stdio};

// ============================================================================
// CommandSpec - Argv-only Process Specification
// ============================================================================

/// How the child's stdout and stderr are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Capture both streams into [`ProcessOutput`](crate::ProcessOutput).
    #[default]
    Capture,
    /// Let the child write straight to the operator's terminal.
    ///
    /// Used for long-running Terraform lifecycle commands whose progress the
    /// operator needs to see. The captured buffers are empty in this mode.
    Inherit,
}

/// Specification for a command to execute.
///
/// All process execution goes through this type to ensure argv-style invocation.
/// Arguments are stored as discrete elements and are never joined into a
/// shell string.
///
/// # Example
///
/// ```rust
/// use clusterup_runner::CommandSpec;
/// use std::ffi::OsString;
///
/// let cmd = CommandSpec::new("terraform")
///     .arg("-chdir=aws")
///     .arg("init")
///     .cwd("/tmp/citc-terraform");
///
/// assert_eq!(cmd.program, OsString::from("terraform"));
/// assert_eq!(cmd.args.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    /// The program to execute
    pub program: OsString,
    /// Arguments as discrete elements (NOT shell strings)
    pub args: Vec<OsString>,
    /// Optional working directory
    pub cwd: Option<PathBuf>,
    /// Optional environment overrides
    pub env: Option<HashMap<OsString, OsString>>,
    /// Stream wiring for stdout/stderr
    pub output: OutputMode,
}

impl CommandSpec {
    /// Create a new `CommandSpec` with the given program.
    #[must_use]
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Add a single argument to the command.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments to the command.
    ///
    /// ```rust
    /// use clusterup_runner::CommandSpec;
    ///
    /// let cmd = CommandSpec::new("ssh-keygen")
    ///     .args(["-t", "ed25519", "-f", "citc-key", "-N", ""]);
    /// assert_eq!(cmd.args.len(), 6);
    /// ```
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory for the command.
    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set an environment variable for the command.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Stream the child's output to the terminal instead of capturing it.
    #[must_use]
    pub fn inherit_output(mut self) -> Self {
        self.output = OutputMode::Inherit;
        self
    }

    /// Program name as a lossy UTF-8 string, for logs and error messages.
    #[must_use]
    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// Arguments as lossy UTF-8 strings.
    #[must_use]
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Whether any argument equals `needle`.
    #[must_use]
    pub fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a == needle)
    }

    /// Convert this `CommandSpec` into a `std::process::Command`.
    ///
    /// stdin is always null: none of the driven tools may prompt.
    #[must_use]
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).stdin(Stdio::null());

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        if let Some(ref env) = self.env {
            for (key, value) in env {
                cmd.env(key, value);
            }
        }

        match self.output {
            OutputMode::Capture => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
            OutputMode::Inherit => {
                cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
        }

        cmd
    }
}
