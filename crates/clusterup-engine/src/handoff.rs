//! Transfer of the Terraform working tree to the management node.
//!
//! After apply the working tree is renamed after the cluster, stripped of the
//! provider plugin cache, packed into one gzip tarball and copied to the node
//! with `scp`. The cluster uses it to manage (and later destroy) itself.

use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::ProvisionError;
use crate::infra::remove_dir_if_present;
use crate::progress::Progress;
use crate::retry::{RetryError, RetryPolicy, retry_until};
use crate::runner::{CommandSpec, ProcessRunner};
use crate::types::Provider;
use crate::{KEY_FILE_NAME, WORK_DIR_NAME};

/// File name of the archive the management node expects.
pub const ARCHIVE_FILE_NAME: &str = "citc-terraform.tar.gz";

/// Progress line printed after each failed copy.
pub const RETRY_NOTICE: &str = "Trying to upload Terraform state...";

/// What to hand off, and where.
#[derive(Debug, Clone)]
pub struct HandoffRequest {
    /// Directory holding `citc-terraform`.
    pub base_dir: PathBuf,
    pub provider: Provider,
    pub cluster_address: String,
    pub cluster_id: String,
    pub dry_run: bool,
    pub policy: RetryPolicy,
}

/// The packed working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffArchive {
    pub path: PathBuf,
    /// Top-level directory inside the archive, `citc-terraform-{cluster_id}`.
    pub root_dir_name: String,
}

#[derive(Debug, Clone)]
pub struct HandoffReport {
    pub archive: HandoffArchive,
    /// Private key path relative to the base directory.
    pub key_path: PathBuf,
    /// Copy attempts made; 0 for a simulated transfer.
    pub attempts: u32,
    pub simulated: bool,
}

/// `citc-terraform-{cluster_id}`.
#[must_use]
pub fn handoff_dir_name(cluster_id: &str) -> String {
    format!("{WORK_DIR_NAME}-{cluster_id}")
}

/// Rename the working tree after the cluster and drop `{provider}/.terraform`.
///
/// A tree left over from an earlier run with the same identifier is replaced.
pub fn prepare_tree(
    base_dir: &Path,
    cluster_id: &str,
    provider: Provider,
) -> Result<PathBuf, ProvisionError> {
    let source = base_dir.join(WORK_DIR_NAME);
    let target = base_dir.join(handoff_dir_name(cluster_id));

    if target != source {
        remove_dir_if_present(&target)?;
        std::fs::rename(&source, &target)?;
    }
    remove_dir_if_present(&target.join(provider.terraform_dir()).join(".terraform"))?;
    Ok(target)
}

/// Pack `base_dir/{root_dir_name}` into `base_dir/citc-terraform.tar.gz`.
pub fn build_archive(
    base_dir: &Path,
    root_dir_name: &str,
) -> Result<HandoffArchive, ProvisionError> {
    let path = base_dir.join(ARCHIVE_FILE_NAME);
    let file = File::create(&path)?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder.append_dir_all(root_dir_name, base_dir.join(root_dir_name))?;
    builder.into_inner()?.finish()?;

    debug!(archive = %path.display(), root = %root_dir_name, "Built handoff archive");
    Ok(HandoffArchive {
        path,
        root_dir_name: root_dir_name.to_string(),
    })
}

/// `scp` invocation for one copy attempt, run from the base directory.
#[must_use]
pub fn upload_command(config: &Config, key_path: &Path, address: &str) -> CommandSpec {
    CommandSpec::new(config.scp_program())
        .arg("-i")
        .arg(key_path.as_os_str())
        .args(["-o", "StrictHostKeyChecking no", "-o", "IdentitiesOnly=yes"])
        .arg(ARCHIVE_FILE_NAME)
        .arg(format!("{}@{address}:.", config.remote_user()))
        .inherit_output()
}

/// Move the applied working tree to the cluster.
///
/// The archive is built once and every attempt sends the same file. It is
/// removed after a successful or simulated copy and kept when the copy fails.
pub async fn transfer(
    runner: &dyn ProcessRunner,
    config: &Config,
    cancel: &CancellationToken,
    progress: &Progress,
    request: &HandoffRequest,
) -> Result<HandoffReport, ProvisionError> {
    let root_dir_name = handoff_dir_name(&request.cluster_id);
    prepare_tree(&request.base_dir, &request.cluster_id, request.provider)?;
    let archive = build_archive(&request.base_dir, &root_dir_name)?;
    let key_path = Path::new(&root_dir_name).join(KEY_FILE_NAME);

    if request.dry_run {
        progress.line(format_args!(
            "... pretending to upload the config {} to the cluster ...",
            archive.path.display()
        ));
        std::fs::remove_file(&archive.path)?;
        return Ok(HandoffReport {
            archive,
            key_path,
            attempts: 0,
            simulated: true,
        });
    }

    let cmd = upload_command(config, &key_path, &request.cluster_address).cwd(&request.base_dir);
    let timeout = config.tool_timeout();
    info!(
        address = %request.cluster_address,
        archive = %archive.path.display(),
        "Uploading Terraform state"
    );

    // A runner error means scp never ran; it ends the loop instead of retrying.
    let outcome = retry_until(
        &request.policy,
        cancel,
        "state upload",
        |attempt| {
            let result = match runner.run(&cmd, timeout) {
                Ok(output) if output.success() => Ok(Ok(attempt)),
                Ok(output) => Err(format!("scp exited with code {}", output.code_or_signal())),
                Err(e) => Ok(Err(e)),
            };
            std::future::ready(result)
        },
        |_, _| progress.line(RETRY_NOTICE),
    )
    .await;

    let attempts = match outcome {
        Ok(Ok(attempts)) => attempts,
        Ok(Err(runner_error)) => return Err(ProvisionError::Runner(runner_error)),
        Err(RetryError::Exhausted { attempts, .. }) => {
            return Err(ProvisionError::TransferExhausted {
                archive: archive.path,
                attempts,
            });
        }
        Err(RetryError::Cancelled { .. }) => {
            return Err(ProvisionError::Cancelled {
                during: "state upload".to_string(),
            });
        }
    };

    std::fs::remove_file(&archive.path)?;
    Ok(HandoffReport {
        archive,
        key_path,
        attempts,
        simulated: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ProcessOutput;
    use crate::test_support::{ScriptedRunner, archive_entries, sample_work_tree};
    use std::time::Duration;
    use tempfile::TempDir;

    fn request(base_dir: &Path, dry_run: bool, policy: RetryPolicy) -> HandoffRequest {
        HandoffRequest {
            base_dir: base_dir.to_path_buf(),
            provider: Provider::Aws,
            cluster_address: "3.8.1.2".to_string(),
            cluster_id: "brave-otter".to_string(),
            dry_run,
            policy,
        }
    }

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::with_max_attempts(max_attempts, Duration::from_millis(1))
    }

    #[test]
    fn test_prepare_tree_renames_and_strips_plugins() {
        let temp = TempDir::new().unwrap();
        sample_work_tree(temp.path());

        let dir = prepare_tree(temp.path(), "brave-otter", Provider::Aws).unwrap();

        assert_eq!(dir, temp.path().join("citc-terraform-brave-otter"));
        assert!(!temp.path().join(WORK_DIR_NAME).exists());
        assert!(!dir.join("aws").join(".terraform").exists());
        assert!(dir.join("aws").join("terraform.tfvars").is_file());
    }

    #[test]
    fn test_archive_is_rooted_at_renamed_dir() {
        let temp = TempDir::new().unwrap();
        sample_work_tree(temp.path());
        prepare_tree(temp.path(), "brave-otter", Provider::Aws).unwrap();

        let archive = build_archive(temp.path(), "citc-terraform-brave-otter").unwrap();

        assert_eq!(archive.path, temp.path().join(ARCHIVE_FILE_NAME));
        let entries = archive_entries(&archive.path);
        assert!(!entries.is_empty());
        assert!(
            entries
                .iter()
                .all(|e| e.starts_with("citc-terraform-brave-otter"))
        );
        assert!(entries.iter().any(|e| e.ends_with("aws/terraform.tfvars")));
        assert!(!entries.iter().any(|e| e.contains(".terraform/")));
    }

    #[test]
    fn test_upload_command_shape() {
        let cmd = upload_command(
            &Config::default(),
            Path::new("citc-terraform-x/citc-key"),
            "3.8.1.2",
        );
        assert_eq!(cmd.program_name(), "scp");
        assert_eq!(
            cmd.args_lossy(),
            vec![
                "-i",
                "citc-terraform-x/citc-key",
                "-o",
                "StrictHostKeyChecking no",
                "-o",
                "IdentitiesOnly=yes",
                "citc-terraform.tar.gz",
                "citc@3.8.1.2:."
            ]
        );
    }

    #[tokio::test]
    async fn test_dry_run_simulates_and_removes_archive() {
        let temp = TempDir::new().unwrap();
        sample_work_tree(temp.path());
        let runner = ScriptedRunner::new();
        let cancel = CancellationToken::new();
        let progress = Progress::captured();

        let report = transfer(
            &runner,
            &Config::default(),
            &cancel,
            &progress,
            &request(temp.path(), true, fast(1)),
        )
        .await
        .unwrap();

        assert_eq!(
            progress.lines(),
            [format!(
                "... pretending to upload the config {} to the cluster ...",
                temp.path().join(ARCHIVE_FILE_NAME).display()
            )]
        );
        assert!(report.simulated);
        assert_eq!(report.attempts, 0);
        assert!(runner.commands().is_empty());
        assert!(!report.archive.path.exists());
        assert_eq!(
            report.key_path,
            PathBuf::from("citc-terraform-brave-otter/citc-key")
        );
    }

    #[tokio::test]
    async fn test_retries_until_copy_succeeds() {
        let temp = TempDir::new().unwrap();
        sample_work_tree(temp.path());
        let runner = ScriptedRunner::new().respond_sequence(
            "scp",
            vec![ProcessOutput::failed(1, ""), ProcessOutput::failed(255, "")],
        );
        let cancel = CancellationToken::new();
        let progress = Progress::captured();

        let report = transfer(
            &runner,
            &Config::default(),
            &cancel,
            &progress,
            &request(temp.path(), false, fast(0)),
        )
        .await
        .unwrap();

        assert_eq!(report.attempts, 3);
        assert_eq!(progress.lines(), [RETRY_NOTICE, RETRY_NOTICE]);

        // Every attempt sent the same archive, built once before the first copy.
        let payloads = runner.uploaded_payloads();
        assert_eq!(payloads.len(), 3);
        assert!(!payloads[0].is_empty());
        assert!(payloads.iter().all(|p| p == &payloads[0]));
        let scp_calls = runner.commands_for("scp");
        assert_eq!(scp_calls.len(), 3);
        assert!(
            scp_calls
                .iter()
                .all(|c| c.cwd.as_deref() == Some(temp.path()))
        );
        assert!(!temp.path().join(ARCHIVE_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_bounded_policy_keeps_archive() {
        let temp = TempDir::new().unwrap();
        sample_work_tree(temp.path());
        let runner = ScriptedRunner::new().fail_program("scp", 1);
        let cancel = CancellationToken::new();

        let err = transfer(
            &runner,
            &Config::default(),
            &cancel,
            &Progress::captured(),
            &request(temp.path(), false, fast(2)),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::TransferExhausted { attempts: 2, .. }
        ));
        assert!(temp.path().join(ARCHIVE_FILE_NAME).is_file());
    }

    #[tokio::test]
    async fn test_cancellation_during_backoff() {
        let temp = TempDir::new().unwrap();
        sample_work_tree(temp.path());
        let runner = ScriptedRunner::new().fail_program("scp", 1);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = transfer(
            &runner,
            &Config::default(),
            &cancel,
            &Progress::captured(),
            &request(
                temp.path(),
                false,
                RetryPolicy::unbounded(Duration::from_secs(60)),
            ),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ProvisionError::Cancelled { .. }));
        assert_eq!(runner.commands_for("scp").len(), 1);
    }

    #[tokio::test]
    async fn test_missing_scp_is_not_retried() {
        let temp = TempDir::new().unwrap();
        sample_work_tree(temp.path());
        let runner = ScriptedRunner::new().spawn_error("scp");
        let cancel = CancellationToken::new();

        let err = transfer(
            &runner,
            &Config::default(),
            &cancel,
            &Progress::captured(),
            &request(temp.path(), false, fast(0)),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ProvisionError::Runner(_)));
        assert_eq!(runner.commands_for("scp").len(), 1);
    }
}
