//! Read-only AWS credential probe.
//!
//! `aws --dry-run ec2 describe-images` never changes anything. With valid
//! credentials the API answers `DryRunOperation` (a non-zero exit), which is the
//! success signal.

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ProvisionError;
use crate::progress::Progress;
use crate::runner::{CommandSpec, ProcessRunner};

/// Marker the API returns when the request would have succeeded.
pub const DRY_RUN_MARKER: &str = "DryRunOperation";
/// Marker for an expired session token.
pub const EXPIRED_MARKER: &str = "RequestExpired";

/// Result of interpreting the probe's exit status and combined output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreflightOutcome {
    /// Exit status zero.
    Passed,
    /// Non-zero exit carrying the dry-run marker.
    DryRunAccepted,
    /// Anything else; `expired` when the output carries the expiry marker.
    Failed { output: String, expired: bool },
}

/// Classify a probe result. The dry-run marker wins over the expiry marker.
#[must_use]
pub fn classify(success: bool, combined_output: &str) -> PreflightOutcome {
    if success {
        return PreflightOutcome::Passed;
    }
    let expired = combined_output.contains(EXPIRED_MARKER);
    if combined_output.contains(DRY_RUN_MARKER) {
        return PreflightOutcome::DryRunAccepted;
    }
    PreflightOutcome::Failed {
        output: combined_output.to_string(),
        expired,
    }
}

/// Build the probe command.
#[must_use]
pub fn probe_command(config: &Config, profile: Option<&str>, region: Option<&str>) -> CommandSpec {
    let mut cmd =
        CommandSpec::new(config.aws_program()).args(["--dry-run", "ec2", "describe-images"]);
    if let Some(profile) = profile {
        cmd = cmd.args(["--profile", profile]);
    }
    if let Some(region) = region {
        cmd = cmd.args(["--region", region]);
    }
    cmd
}

/// Run the credential probe.
///
/// On failure the tool's output goes to `progress` verbatim, preceded by
/// "AWS credentials have expired:" when the session has expired.
pub fn check_credentials(
    runner: &dyn ProcessRunner,
    config: &Config,
    progress: &Progress,
    profile: Option<&str>,
    region: Option<&str>,
) -> Result<PreflightOutcome, ProvisionError> {
    let cmd = probe_command(config, profile, region);
    let output = runner.run(&cmd, config.tool_timeout())?;
    let outcome = classify(output.success(), &output.combined_string());

    match &outcome {
        PreflightOutcome::Passed | PreflightOutcome::DryRunAccepted => {
            debug!(outcome = ?outcome, "Credential preflight passed");
            Ok(outcome)
        }
        PreflightOutcome::Failed { output, expired } => {
            if *expired {
                progress.line("AWS credentials have expired:");
            }
            progress.line(output);
            warn!(expired = *expired, "Credential preflight failed");
            Err(ProvisionError::CredentialFailure {
                output: output.clone(),
                expired: *expired,
            })
        }
    }
}
