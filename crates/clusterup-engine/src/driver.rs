//! Typed wrapper around the Terraform lifecycle commands.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::ProvisionError;
use crate::runner::{CommandSpec, ProcessRunner};
use crate::types::Provider;

/// Output holding the management node's public address.
pub const ADDRESS_OUTPUT: &str = "ManagementPublicIP";
/// Output holding the cluster identifier.
pub const CLUSTER_ID_OUTPUT: &str = "cluster_id";
/// Set on every terraform invocation; stdin is closed, so nothing may prompt.
pub const AUTOMATION_ENV: &str = "TF_IN_AUTOMATION";

/// Values read back from Terraform state after apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionOutputs {
    pub cluster_address: String,
    pub cluster_id: String,
}

/// Runs `terraform -chdir=<provider> ...` from the working directory.
pub struct TerraformDriver<'a> {
    runner: &'a dyn ProcessRunner,
    binary: PathBuf,
    work_dir: PathBuf,
    provider: Provider,
    timeout: Option<Duration>,
}

impl<'a> TerraformDriver<'a> {
    pub fn new(
        runner: &'a dyn ProcessRunner,
        binary: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
        provider: Provider,
    ) -> Self {
        Self {
            runner,
            binary: binary.into(),
            work_dir: work_dir.into(),
            provider,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new(self.binary.as_os_str())
            .arg(format!("-chdir={}", self.provider.terraform_dir()))
            .cwd(&self.work_dir)
            .env(AUTOMATION_ENV, "1")
    }

    fn run_streamed(&self, step: &str, args: &[&str]) -> Result<(), ProvisionError> {
        info!(step = %step, "Running terraform");
        let cmd = self.command().args(args.iter().copied()).inherit_output();
        let output = self.runner.run(&cmd, self.timeout)?;
        if output.success() {
            Ok(())
        } else {
            Err(ProvisionError::ToolInvocation {
                tool: "terraform".to_string(),
                step: step.to_string(),
                code: output.code_or_signal(),
            })
        }
    }

    pub fn init(&self) -> Result<(), ProvisionError> {
        self.run_streamed("init", &["init"])
    }

    pub fn validate(&self) -> Result<(), ProvisionError> {
        self.run_streamed("validate", &["validate"])
    }

    pub fn apply(&self) -> Result<(), ProvisionError> {
        self.run_streamed("apply", &["apply", "-auto-approve"])
    }

    /// Read one raw output value from `terraform.tfstate`.
    ///
    /// Whitespace and surrounding quotes are stripped; an empty value is
    /// [`ProvisionError::OutputMissing`].
    pub fn output(&self, name: &str) -> Result<String, ProvisionError> {
        let cmd = self.command().args([
            "output",
            "-no-color",
            "-raw",
            "-state=terraform.tfstate",
            name,
        ]);
        let output = self.runner.run(&cmd, self.timeout)?;
        if !output.success() {
            return Err(ProvisionError::ToolInvocation {
                tool: "terraform".to_string(),
                step: format!("output {name}"),
                code: output.code_or_signal(),
            });
        }

        let value = clean_output(&output.stdout_string());
        if value.is_empty() {
            return Err(ProvisionError::OutputMissing {
                name: name.to_string(),
            });
        }
        Ok(value)
    }

    /// Read the address and identifier the handoff needs.
    pub fn outputs(&self) -> Result<ProvisionOutputs, ProvisionError> {
        Ok(ProvisionOutputs {
            cluster_address: self.output(ADDRESS_OUTPUT)?,
            cluster_id: self.output(CLUSTER_ID_OUTPUT)?,
        })
    }
}

/// Trim whitespace, then surrounding double quotes.
#[must_use]
pub fn clean_output(raw: &str) -> String {
    raw.trim().trim_matches('"').to_string()
}
