//! CLI entry point
//!
//! This module owns the `run()` function which:
//! - Parses CLI arguments and the provider
//! - Builds CliArgs and discovers Config
//! - Creates the tokio runtime and the interrupt listener
//! - Runs the orchestrator and prints its report
//! - Handles all error output

use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::args::Cli;

use crate::download::HttpDownloader;
use crate::logging::init_tracing;
use crate::progress::Progress;
use crate::runner::NativeRunner;
use crate::types::{Provider, RenderMode};
use crate::{CliArgs, Config, ExitCode, Orchestrator, ProvisionError, ProvisionRequest, RunReport};

/// Main CLI execution function.
///
/// Prints everything, including errors, and returns the exit code for
/// `main` to hand to the process.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    // Checked first so an unknown provider fails before any network access.
    let provider = cli.provider.parse::<Provider>().map_err(report)?;

    let config = Config::discover(&cli_args(&cli))
        .map_err(|err| report(ProvisionError::Config(err)))?;

    if let Err(e) = init_tracing(config.verbose(), cli.json) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    let base_dir = std::env::current_dir()
        .map_err(|e| report(ProvisionError::Io(e)))?;
    let downloader = HttpDownloader::new().map_err(|e| report(ProvisionError::Fetch(e)))?;
    let request = provision_request(&cli, provider, &config);

    let cancel = CancellationToken::new();
    let result = rt.block_on(async {
        let listener = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, stopping");
                listener.cancel();
            }
        });

        // With --json, stdout carries only the report document.
        let runner = NativeRunner::new().with_streamed_stdout_to_stderr(cli.json);
        Orchestrator::new(config, base_dir, Arc::new(runner), Arc::new(downloader))
            .with_cancellation(cancel)
            .with_progress(Progress::for_output(cli.json))
            .run(&request)
            .await
    });

    match result {
        Ok(run_report) => match render_report(&run_report, cli.json) {
            Ok(text) => {
                print!("{text}");
                Ok(())
            }
            Err(e) => {
                eprintln!("Error: failed to serialize run report: {e}");
                Err(ExitCode::INTERNAL)
            }
        },
        Err(err) => Err(report(err)),
    }
}

/// Translate parsed flags into the configuration layer's CLI arguments.
#[must_use]
pub fn cli_args(cli: &Cli) -> CliArgs {
    CliArgs {
        config_path: cli.config.clone(),
        infra_repo: cli.infra_repo.clone(),
        infra_branch: cli.infra_branch.clone(),
        verbose: Some(cli.verbose),
        render_mode: cli.legacy_render.then_some(RenderMode::Legacy),
        max_upload_attempts: cli.max_upload_attempts,
    }
}

/// The run the operator asked for. Repository and branch come from the
/// effective configuration so file values apply when no flag is given.
#[must_use]
pub fn provision_request(cli: &Cli, provider: Provider, config: &Config) -> ProvisionRequest {
    ProvisionRequest {
        provider,
        dry_run: cli.dry_run,
        region: cli.region.clone(),
        availability_zone: cli.availability_zone.clone(),
        credential_profile: cli.profile.clone(),
        infra_repo: config.infra_repo().to_string(),
        infra_branch: config.infra_branch().to_string(),
        extension_repo: cli.extension_repo.clone(),
        extension_branch: cli.extension_branch.clone(),
    }
}

/// Everything written to stdout after a successful run: the pretty JSON
/// document with `--json`, the closing banner otherwise.
pub fn render_report(run_report: &RunReport, json: bool) -> Result<String, serde_json::Error> {
    if json {
        let mut text = serde_json::to_string_pretty(run_report)?;
        text.push('\n');
        Ok(text)
    } else {
        Ok(run_report.summary.banner())
    }
}

fn report(err: ProvisionError) -> ExitCode {
    tracing::debug!(error = ?err, "Run failed");
    eprint!("{}", err.display_for_user());
    err.to_exit_code()
}
