//! Provisioning orchestrator
//!
//! Sequences the workflow as a fixed chain of [`Step`]s. Collaborators (process
//! runner, downloader, cancellation token, configuration, base directory) are
//! passed in explicitly; the process working directory is never changed.
//!
//! There is no rollback: a failing step ends the run, and Terraform state is
//! the record of anything already created.

mod step;
mod summary;

pub use step::{Step, StepRecord, StepStatus};
pub use summary::Summary;

use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::{Config, DEFAULT_INFRA_BRANCH, DEFAULT_INFRA_REPO};
use crate::download::Downloader;
use crate::driver::{ProvisionOutputs, TerraformDriver};
use crate::error::ProvisionError;
use crate::handoff::{HandoffReport, HandoffRequest};
use crate::keys::KeyPair;
use crate::logging::{log_step_complete, log_step_error, log_step_start, step_span};
use crate::platform::HostPlatform;
use crate::preflight::PreflightOutcome;
use crate::progress::Progress;
use crate::render::TFVARS_FILE;
use crate::retry::RetryPolicy;
use crate::runner::ProcessRunner;
use crate::types::Provider;
use crate::{handoff, infra, keys, preflight, render, tool};

/// Address reported in place of a real one during a dry run.
pub const DRY_RUN_ADDRESS: &str = "1.1.1.1";
/// Cluster identifier reported in place of a real one during a dry run.
pub const DRY_RUN_CLUSTER_ID: &str = "test-cluster";

/// One provisioning run as requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionRequest {
    pub provider: Provider,
    pub dry_run: bool,
    pub region: Option<String>,
    pub availability_zone: Option<String>,
    pub credential_profile: Option<String>,
    pub infra_repo: String,
    pub infra_branch: String,
    /// Overrides the configuration-management repository the cluster pulls.
    pub extension_repo: Option<String>,
    pub extension_branch: Option<String>,
}

impl ProvisionRequest {
    /// Request with no overrides, against the default infrastructure branch.
    #[must_use]
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            dry_run: false,
            region: None,
            availability_zone: None,
            credential_profile: None,
            infra_repo: DEFAULT_INFRA_REPO.to_string(),
            infra_branch: DEFAULT_INFRA_BRANCH.to_string(),
            extension_repo: None,
            extension_branch: None,
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub summary: Summary,
    pub steps: Vec<StepRecord>,
}

/// Values produced by one step and consumed by later ones.
#[derive(Default)]
struct RunState {
    work_dir: Option<PathBuf>,
    terraform: Option<PathBuf>,
    keys: Option<KeyPair>,
    outputs: Option<ProvisionOutputs>,
    handoff: Option<HandoffReport>,
    summary: Option<Summary>,
}

/// Fetch a value an earlier step must have produced.
fn produced<'s, T>(value: Option<&'s T>, what: &str, step: Step) -> Result<&'s T, ProvisionError> {
    value.ok_or_else(|| {
        ProvisionError::Io(std::io::Error::other(format!(
            "{what} not available at step {step}"
        )))
    })
}

struct Outcome {
    status: StepStatus,
    detail: Option<String>,
}

impl Outcome {
    fn completed() -> Self {
        Self {
            status: StepStatus::Completed,
            detail: None,
        }
    }

    fn with(status: StepStatus, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: Some(detail.into()),
        }
    }
}

/// Drives one provisioning run.
pub struct Orchestrator {
    config: Config,
    base_dir: PathBuf,
    runner: Arc<dyn ProcessRunner>,
    downloader: Arc<dyn Downloader>,
    cancel: CancellationToken,
    platform: Option<HostPlatform>,
    retry_policy: Option<RetryPolicy>,
    progress: Progress,
    history: Mutex<Vec<StepRecord>>,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        base_dir: impl Into<PathBuf>,
        runner: Arc<dyn ProcessRunner>,
        downloader: Arc<dyn Downloader>,
    ) -> Self {
        Self {
            config,
            base_dir: base_dir.into(),
            runner,
            downloader,
            cancel: CancellationToken::new(),
            platform: None,
            retry_policy: None,
            progress: Progress::default(),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Observe `cancel` during upload backoff and between steps.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Use `platform` instead of detecting the host.
    #[must_use]
    pub fn with_platform(mut self, platform: HostPlatform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Use `policy` for the state upload instead of the configured one.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Write operator progress lines to `progress` instead of stdout.
    #[must_use]
    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Steps recorded by the latest run so far, including a failed one.
    pub fn history(&self) -> Vec<StepRecord> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    fn record(&self, record: StepRecord) {
        if let Ok(mut history) = self.history.lock() {
            history.push(record);
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy.unwrap_or_else(|| RetryPolicy {
            max_attempts: self.config.max_upload_attempts().unwrap_or(0),
            interval: self.config.retry_interval(),
        })
    }

    fn driver<'a>(
        &'a self,
        state: &RunState,
        request: &ProvisionRequest,
        step: Step,
    ) -> Result<TerraformDriver<'a>, ProvisionError> {
        let work_dir = produced(state.work_dir.as_ref(), "working directory", step)?;
        let terraform = produced(state.terraform.as_ref(), "terraform binary", step)?;
        Ok(
            TerraformDriver::new(self.runner.as_ref(), terraform, work_dir, request.provider)
                .with_timeout(self.config.tool_timeout()),
        )
    }

    /// Run every step in order.
    ///
    /// Fails before any network access when the host platform is unsupported.
    /// History from an earlier run on the same orchestrator is discarded.
    pub async fn run(&self, request: &ProvisionRequest) -> Result<RunReport, ProvisionError> {
        if let Ok(mut history) = self.history.lock() {
            history.clear();
        }
        let platform = match &self.platform {
            Some(platform) => platform.clone(),
            None => HostPlatform::detect()?,
        };

        self.progress.line(format_args!(
            "Installing Cluster in the Cloud on {}",
            request.provider.display_name()
        ));

        let mut state = RunState::default();
        let mut current = Some(Step::first());

        while let Some(step) = current {
            if self.cancel.is_cancelled() {
                return Err(ProvisionError::Cancelled {
                    during: step.to_string(),
                });
            }

            let span = step_span(step.as_str(), request.provider.as_str(), request.dry_run);
            let started_at = Utc::now();
            let started = Instant::now();
            log_step_start(step.as_str());

            let result = self
                .execute(step, request, &platform, &mut state)
                .instrument(span)
                .await;
            let elapsed = started.elapsed().as_millis();
            let duration_ms = u64::try_from(elapsed).unwrap_or(u64::MAX);

            match result {
                Ok(outcome) => {
                    log_step_complete(step.as_str(), &outcome.status.to_string(), elapsed);
                    self.record(StepRecord {
                        step,
                        status: outcome.status,
                        started_at,
                        duration_ms,
                        detail: outcome.detail,
                    });
                }
                Err(err) => {
                    log_step_error(step.as_str(), &err.to_string(), elapsed);
                    self.record(StepRecord {
                        step,
                        status: StepStatus::Failed,
                        started_at,
                        duration_ms,
                        detail: Some(err.to_string()),
                    });
                    // An interrupt also kills the child tool; report the interrupt.
                    if self.cancel.is_cancelled()
                        && !matches!(err, ProvisionError::Cancelled { .. })
                    {
                        return Err(ProvisionError::Cancelled {
                            during: step.to_string(),
                        });
                    }
                    return Err(err);
                }
            }

            current = step.next();
        }

        let summary = produced(state.summary.as_ref(), "summary", Step::Summarize)?.clone();
        Ok(RunReport {
            summary,
            steps: self.history(),
        })
    }

    async fn execute(
        &self,
        step: Step,
        request: &ProvisionRequest,
        platform: &HostPlatform,
        state: &mut RunState,
    ) -> Result<Outcome, ProvisionError> {
        let runner = self.runner.as_ref();
        let config = &self.config;

        match step {
            Step::Preflight => {
                if request.dry_run {
                    return Ok(Outcome::with(StepStatus::Skipped, "dry run"));
                }
                let outcome = preflight::check_credentials(
                    runner,
                    config,
                    &self.progress,
                    request.credential_profile.as_deref(),
                    request.region.as_deref(),
                )?;
                let detail = match outcome {
                    PreflightOutcome::DryRunAccepted => "dry-run operation accepted",
                    _ => "credentials valid",
                };
                Ok(Outcome::with(StepStatus::Completed, detail))
            }
            Step::FetchInfra => {
                let work_dir = infra::fetch_infra(
                    self.downloader.as_ref(),
                    config,
                    &self.progress,
                    &request.infra_repo,
                    &request.infra_branch,
                    &self.base_dir,
                )
                .await?;
                state.work_dir = Some(work_dir);
                Ok(Outcome::with(
                    StepStatus::Completed,
                    format!("{}@{}", request.infra_repo, request.infra_branch),
                ))
            }
            Step::FetchTool => {
                let work_dir = produced(state.work_dir.as_ref(), "working directory", step)?;
                let binary = tool::fetch_tool(
                    self.downloader.as_ref(),
                    config,
                    &self.progress,
                    platform,
                    work_dir,
                )
                .await?;
                state.terraform = Some(binary);
                Ok(Outcome::with(
                    StepStatus::Completed,
                    format!("terraform {} for {platform}", config.terraform_version()),
                ))
            }
            Step::EnsureKeys => {
                let work_dir = produced(state.work_dir.as_ref(), "working directory", step)?;
                let existed = KeyPair::in_dir(work_dir).private_path.is_file();
                state.keys = Some(keys::ensure_key_pair(runner, config, work_dir)?);
                Ok(Outcome::with(
                    StepStatus::Completed,
                    if existed { "reused" } else { "generated" },
                ))
            }
            Step::InitValidate => {
                let driver = self.driver(state, request, step)?;
                driver.init()?;
                driver.validate()?;
                Ok(Outcome::completed())
            }
            Step::Render => {
                let work_dir = produced(state.work_dir.as_ref(), "working directory", step)?;
                let pair = produced(state.keys.as_ref(), "key pair", step)?;
                let public_key = render::read_public_key(&pair.public_path)?;
                let template = work_dir
                    .join(request.provider.terraform_dir())
                    .join(TFVARS_FILE);
                let rendered =
                    render::render(&template, request, &public_key, config.render_mode())?;
                Ok(Outcome::with(
                    StepStatus::Completed,
                    format!(
                        "{} mode, {} assignment(s)",
                        config.render_mode(),
                        rendered.assignments.len()
                    ),
                ))
            }
            Step::Apply => {
                if request.dry_run {
                    self.progress.line("... pretending to create the cluster ...");
                    return Ok(Outcome::with(StepStatus::Simulated, "dry run"));
                }
                self.driver(state, request, step)?.apply()?;
                Ok(Outcome::completed())
            }
            Step::ExtractOutputs => {
                let (outputs, status) = if request.dry_run {
                    let placeholders = ProvisionOutputs {
                        cluster_address: DRY_RUN_ADDRESS.to_string(),
                        cluster_id: DRY_RUN_CLUSTER_ID.to_string(),
                    };
                    (placeholders, StepStatus::Simulated)
                } else {
                    (
                        self.driver(state, request, step)?.outputs()?,
                        StepStatus::Completed,
                    )
                };
                let detail = format!("{} ({})", outputs.cluster_address, outputs.cluster_id);
                state.outputs = Some(outputs);
                Ok(Outcome::with(status, detail))
            }
            Step::Handoff => {
                let outputs = produced(state.outputs.as_ref(), "outputs", step)?;
                let handoff_request = HandoffRequest {
                    base_dir: self.base_dir.clone(),
                    provider: request.provider,
                    cluster_address: outputs.cluster_address.clone(),
                    cluster_id: outputs.cluster_id.clone(),
                    dry_run: request.dry_run,
                    policy: self.retry_policy(),
                };
                let report = handoff::transfer(
                    runner,
                    config,
                    &self.cancel,
                    &self.progress,
                    &handoff_request,
                )
                .await?;
                let archive_name = report
                    .archive
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let outcome = if report.simulated {
                    Outcome::with(
                        StepStatus::Simulated,
                        format!("pretended upload of {archive_name}"),
                    )
                } else {
                    Outcome::with(
                        StepStatus::Completed,
                        format!("{} attempt(s)", report.attempts),
                    )
                };
                state.handoff = Some(report);
                Ok(outcome)
            }
            Step::Summarize => {
                let outputs = produced(state.outputs.as_ref(), "outputs", step)?;
                let report = produced(state.handoff.as_ref(), "handoff report", step)?;
                state.summary = Some(Summary::new(
                    request.provider,
                    &report.key_path,
                    &outputs.cluster_address,
                    &outputs.cluster_id,
                    config.remote_user(),
                    config.destroy_command(),
                    request.dry_run,
                ));
                Ok(Outcome::completed())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_INFRA_URL_TEMPLATE;
    use crate::runner::ProcessOutput;
    use crate::test_support::{
        SAMPLE_TFVARS, ScriptedRunner, StaticDownloader, infra_tarball, terraform_release_zip,
    };
    use std::time::Duration;
    use tempfile::TempDir;

    fn linux() -> HostPlatform {
        HostPlatform::resolve("linux", "x86_64").unwrap()
    }

    fn downloader() -> StaticDownloader {
        let infra_url = DEFAULT_INFRA_URL_TEMPLATE
            .replace("{repo}", DEFAULT_INFRA_REPO)
            .replace("{branch}", DEFAULT_INFRA_BRANCH);
        StaticDownloader::new()
            .with(&infra_url, infra_tarball("terraform-master", SAMPLE_TFVARS))
            .with_default(terraform_release_zip())
    }

    fn orchestrator(base: &Path, runner: Arc<ScriptedRunner>) -> Orchestrator {
        let config = Config::builder().build().unwrap();
        Orchestrator::new(config, base, runner, Arc::new(downloader()))
            .with_platform(linux())
            .with_retry_policy(RetryPolicy::unbounded(Duration::from_millis(1)))
            .with_progress(Progress::captured())
    }

    #[test]
    fn test_request_defaults() {
        let request = ProvisionRequest::new(Provider::Aws);
        assert!(!request.dry_run);
        assert_eq!(request.infra_repo, DEFAULT_INFRA_REPO);
        assert_eq!(request.infra_branch, DEFAULT_INFRA_BRANCH);
        assert!(request.region.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dry_run_records_every_step() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let orchestrator = orchestrator(temp.path(), runner.clone());
        let mut request = ProvisionRequest::new(Provider::Aws);
        request.dry_run = true;

        let report = orchestrator.run(&request).await.unwrap();

        let statuses: Vec<(Step, StepStatus)> =
            report.steps.iter().map(|r| (r.step, r.status)).collect();
        assert_eq!(statuses.len(), 10);
        assert_eq!(statuses[0], (Step::Preflight, StepStatus::Skipped));
        assert_eq!(statuses[6], (Step::Apply, StepStatus::Simulated));
        assert_eq!(statuses[8], (Step::Handoff, StepStatus::Simulated));
        assert_eq!(statuses[9], (Step::Summarize, StepStatus::Completed));
        assert_eq!(report.summary.cluster_address, DRY_RUN_ADDRESS);
        assert!(!runner.programs().iter().any(|p| p == "aws" || p == "scp"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_step_is_recorded_and_stops_run() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::new().respond_when(
            "terraform",
            "validate",
            ProcessOutput::failed(1, "Error: invalid"),
        ));
        let orchestrator = orchestrator(temp.path(), runner.clone());
        let mut request = ProvisionRequest::new(Provider::Aws);
        request.dry_run = true;

        let err = orchestrator.run(&request).await.unwrap_err();

        assert!(matches!(err, ProvisionError::ToolInvocation { .. }));
        let history = orchestrator.history();
        let last = history.last().unwrap();
        assert_eq!(last.step, Step::InitValidate);
        assert_eq!(last.status, StepStatus::Failed);
        assert!(!runner.commands_for("terraform").iter().any(|c| c.has_arg("apply")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_second_run_reports_only_its_own_steps() {
        let temp = TempDir::new().unwrap();
        let orchestrator = orchestrator(temp.path(), Arc::new(ScriptedRunner::new()));
        let mut request = ProvisionRequest::new(Provider::Aws);
        request.dry_run = true;

        orchestrator.run(&request).await.unwrap();
        let report = orchestrator.run(&request).await.unwrap();

        assert_eq!(report.steps.len(), 10);
        assert_eq!(orchestrator.history().len(), 10);
        assert_eq!(report.steps[0].step, Step::Preflight);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_progress_lines_go_to_configured_sink() {
        let temp = TempDir::new().unwrap();
        let progress = Progress::captured();
        let orchestrator = orchestrator(temp.path(), Arc::new(ScriptedRunner::new()))
            .with_progress(progress.clone());
        let mut request = ProvisionRequest::new(Provider::Aws);
        request.dry_run = true;

        orchestrator.run(&request).await.unwrap();

        let lines = progress.lines();
        assert_eq!(lines.len(), 5, "{lines:?}");
        assert_eq!(lines[0], "Installing Cluster in the Cloud on AWS");
        assert_eq!(lines[1], "Downloading CitC Terraform configuration");
        assert_eq!(lines[2], "Downloading Terraform binary");
        assert_eq!(lines[3], "... pretending to create the cluster ...");
        assert!(lines[4].starts_with("... pretending to upload the config "));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancelled_before_start() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let token = CancellationToken::new();
        token.cancel();
        let orchestrator = orchestrator(temp.path(), runner.clone()).with_cancellation(token);

        let err = orchestrator
            .run(&ProvisionRequest::new(Provider::Aws))
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::Cancelled { ref during } if during == "preflight"));
        assert!(runner.commands().is_empty());
    }
}
