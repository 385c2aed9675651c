//! End-to-end runs of the provisioning workflow against scripted tools.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clusterup_engine::config::{Config, DEFAULT_INFRA_BRANCH, DEFAULT_INFRA_REPO};
use clusterup_engine::error::ProvisionError;
use clusterup_engine::exit_codes::ExitCode;
use clusterup_engine::handoff::ARCHIVE_FILE_NAME;
use clusterup_engine::orchestrator::{Step, StepStatus};
use clusterup_engine::platform::HostPlatform;
use clusterup_engine::retry::RetryPolicy;
use clusterup_engine::runner::ProcessOutput;
use clusterup_engine::test_support::{
    SAMPLE_TFVARS, ScriptedRunner, StaticDownloader, archive_entries, infra_tarball,
    terraform_release_zip,
};
use clusterup_engine::types::Provider;
use clusterup_engine::{Orchestrator, ProvisionRequest};
use tempfile::TempDir;

fn downloader(branch: &str) -> StaticDownloader {
    let url = Config::default().infra_url(DEFAULT_INFRA_REPO, branch);
    StaticDownloader::new()
        .with(&url, infra_tarball(&format!("terraform-{branch}"), SAMPLE_TFVARS))
        .with_default(terraform_release_zip())
}

fn orchestrator(base: &Path, runner: Arc<ScriptedRunner>, config: Config) -> Orchestrator {
    Orchestrator::new(config, base, runner, Arc::new(downloader(DEFAULT_INFRA_BRANCH)))
        .with_platform(HostPlatform::resolve("linux", "x86_64").unwrap())
        .with_retry_policy(RetryPolicy::unbounded(Duration::from_millis(1)))
}

/// Terraform answers both outputs; the credential probe is accepted.
fn provisioning_runner() -> ScriptedRunner {
    ScriptedRunner::new()
        .respond(
            "aws",
            ProcessOutput::failed(
                254,
                "An error occurred (DryRunOperation) when calling the DescribeImages operation",
            ),
        )
        .respond_when(
            "terraform",
            "ManagementPublicIP",
            ProcessOutput::ok(&b"\"52.18.0.7\"\n"[..]),
        )
        .respond_when("terraform", "cluster_id", ProcessOutput::ok(&b"fluent-owl\n"[..]))
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dry_run_simulates_every_remote_action() {
    let temp = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::new());
    let orchestrator = orchestrator(temp.path(), runner.clone(), Config::default());
    let mut request = ProvisionRequest::new(Provider::Aws);
    request.dry_run = true;

    let report = orchestrator.run(&request).await.unwrap();

    let programs = runner.programs();
    assert!(!programs.iter().any(|p| p == "aws"), "{programs:?}");
    assert!(!programs.iter().any(|p| p == "scp"), "{programs:?}");
    assert!(
        !runner
            .commands_for("terraform")
            .iter()
            .any(|c| c.has_arg("apply") || c.has_arg("output"))
    );

    assert_eq!(report.summary.cluster_address, "1.1.1.1");
    assert_eq!(report.summary.cluster_id, "test-cluster");
    assert!(report.summary.dry_run);
    assert!(report.summary.destroy_command.contains(" aws 1.1.1.1 "));
    assert_eq!(report.summary.key_path, "citc-terraform-test-cluster/citc-key");

    let handoff = report.steps.iter().find(|r| r.step == Step::Handoff).unwrap();
    assert_eq!(handoff.status, StepStatus::Simulated);
    assert!(handoff.detail.as_deref().unwrap().contains(ARCHIVE_FILE_NAME));

    let tree = temp.path().join("citc-terraform-test-cluster");
    assert!(tree.join("citc-key").is_file());
    assert!(!tree.join("aws").join(".terraform").exists());
    assert!(!temp.path().join(ARCHIVE_FILE_NAME).exists());

    let tfvars = std::fs::read_to_string(tree.join("aws").join("terraform.tfvars")).unwrap();
    assert!(tfvars.contains("private_key_path = \"citc-key\""));
    assert!(tfvars.contains("ssh-ed25519 "));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_full_run_retries_upload_until_it_succeeds() {
    let temp = TempDir::new().unwrap();
    let runner = Arc::new(provisioning_runner().respond_sequence(
        "scp",
        vec![
            ProcessOutput::failed(1, "ssh: connect to host 52.18.0.7 port 22: Connection refused"),
            ProcessOutput::failed(1, "ssh: connect to host 52.18.0.7 port 22: Connection refused"),
            ProcessOutput::ok(Vec::new()),
        ],
    ));
    let orchestrator = orchestrator(temp.path(), runner.clone(), Config::default());
    let mut request = ProvisionRequest::new(Provider::Aws);
    request.region = Some("eu-central-1".to_string());
    request.credential_profile = Some("research".to_string());

    let report = orchestrator.run(&request).await.unwrap();

    let probe = &runner.commands_for("aws")[0];
    assert_eq!(
        probe.args_lossy(),
        [
            "--dry-run",
            "ec2",
            "describe-images",
            "--profile",
            "research",
            "--region",
            "eu-central-1"
        ]
    );

    let uploads = runner.commands_for("scp");
    assert_eq!(uploads.len(), 3);
    assert!(uploads.iter().all(|c| c.args_lossy() == uploads[0].args_lossy()));
    assert!(uploads[0].has_arg("citc@52.18.0.7:."));
    assert!(uploads[0].has_arg("citc-terraform-fluent-owl/citc-key"));

    assert_eq!(report.summary.cluster_id, "fluent-owl");
    assert_eq!(
        report.summary.ssh_command,
        "ssh -i citc-terraform-fluent-owl/citc-key citc@52.18.0.7"
    );
    let handoff = report.steps.iter().find(|r| r.step == Step::Handoff).unwrap();
    assert_eq!(handoff.detail.as_deref(), Some("3 attempt(s)"));
    assert!(!temp.path().join(ARCHIVE_FILE_NAME).exists());

    let tfvars = std::fs::read_to_string(
        temp.path()
            .join("citc-terraform-fluent-owl")
            .join("aws")
            .join("terraform.tfvars"),
    )
    .unwrap();
    assert!(tfvars.contains("region = \"eu-central-1\""));
    assert!(tfvars.contains("profile = \"research\""));
    assert!(!tfvars.contains("eu-west-1"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_bounded_upload_keeps_archive_when_exhausted() {
    let temp = TempDir::new().unwrap();
    let runner = Arc::new(provisioning_runner().fail_program("scp", 1));
    let orchestrator = orchestrator(temp.path(), runner.clone(), Config::default())
        .with_retry_policy(RetryPolicy::with_max_attempts(2, Duration::from_millis(1)));

    let err = orchestrator
        .run(&ProvisionRequest::new(Provider::Aws))
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::TransferExhausted { attempts: 2, .. }));
    assert_eq!(err.to_exit_code(), ExitCode::TRANSFER_FAILED);
    let archive = temp.path().join(ARCHIVE_FILE_NAME);
    assert!(archive.is_file());
    assert!(
        archive_entries(&archive)
            .iter()
            .any(|e| e.starts_with("citc-terraform-fluent-owl"))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_expired_credentials_stop_before_download() {
    let temp = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::new().respond(
        "aws",
        ProcessOutput::failed(
            255,
            "An error occurred (RequestExpired) when calling the DescribeImages operation",
        ),
    ));
    let downloader = Arc::new(downloader(DEFAULT_INFRA_BRANCH));
    let orchestrator = Orchestrator::new(
        Config::default(),
        temp.path(),
        runner.clone(),
        downloader.clone(),
    )
    .with_platform(HostPlatform::resolve("linux", "x86_64").unwrap());

    let err = orchestrator
        .run(&ProvisionRequest::new(Provider::Aws))
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::CredentialFailure { expired: true, .. }));
    assert_eq!(err.to_exit_code(), ExitCode::CREDENTIAL_FAILURE);
    assert!(downloader.requested().is_empty());
    assert_eq!(runner.programs(), ["aws"]);
    let history = orchestrator.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, StepStatus::Failed);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_empty_output_is_reported_missing() {
    let temp = TempDir::new().unwrap();
    let runner = Arc::new(
        ScriptedRunner::new()
            .respond_when("terraform", "ManagementPublicIP", ProcessOutput::ok(&b"\n"[..])),
    );
    let orchestrator = orchestrator(temp.path(), runner.clone(), Config::default());

    let err = orchestrator
        .run(&ProvisionRequest::new(Provider::Aws))
        .await
        .unwrap_err();

    assert!(
        matches!(err, ProvisionError::OutputMissing { ref name } if name == "ManagementPublicIP")
    );
    assert_eq!(err.to_exit_code(), ExitCode::OUTPUT_MISSING);
    assert!(runner.commands_for("scp").is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_branch_is_a_fetch_error() {
    let temp = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::new());
    let orchestrator = orchestrator(temp.path(), runner.clone(), Config::default());
    let mut request = ProvisionRequest::new(Provider::Aws);
    request.dry_run = true;
    request.infra_branch = "no-such-branch".to_string();

    let err = orchestrator.run(&request).await.unwrap_err();

    assert!(matches!(err, ProvisionError::Fetch(_)));
    assert!(runner.commands().is_empty());
}
