//! clusterup - provision a compute cluster in the cloud
//!
//! clusterup downloads the Cluster in the Cloud Terraform configuration and a
//! pinned Terraform release, generates an SSH key, applies the configuration and
//! then copies the resulting Terraform state onto the new management node, so the
//! cluster can later manage and destroy itself.
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! # Simulate a run without touching the cloud
//! clusterup aws --dry-run
//!
//! # Provision into a specific region and profile
//! clusterup aws --region eu-west-1 --profile research
//! ```
//!
//! # Library use
//!
//! The workflow is driven by [`Orchestrator`], with every external tool behind
//! [`runner::ProcessRunner`] and every download behind
//! [`download::Downloader`].
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use clusterup::{Config, Orchestrator, ProvisionRequest};
//! use clusterup::download::HttpDownloader;
//! use clusterup::runner::NativeRunner;
//! use clusterup::types::Provider;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = Orchestrator::new(
//!     Config::default(),
//!     std::env::current_dir()?,
//!     Arc::new(NativeRunner::new()),
//!     Arc::new(HttpDownloader::new()?),
//! );
//! let mut request = ProvisionRequest::new(Provider::Aws);
//! request.dry_run = true;
//! let report = orchestrator.run(&request).await?;
//! println!("{}", report.summary.banner());
//! # Ok(())
//! # }
//! ```
//!
//! # Stable Public API
//!
//! - [`Orchestrator`], [`ProvisionRequest`] and [`RunReport`] - the workflow
//! - [`Config`] and [`ConfigBuilder`] - configuration management
//! - [`ProvisionError`] - library error type
//! - [`ExitCode`] - CLI exit codes

pub use clusterup_engine::{Orchestrator, ProvisionRequest, RunReport};

pub use clusterup_config::Config;

pub use clusterup_config::ConfigBuilder;

pub use clusterup_utils::error::ProvisionError;

pub use clusterup_utils::exit_codes::ExitCode;

pub use clusterup_config::CliArgs;

pub use clusterup_utils::error::ErrorCategory;

pub use clusterup_utils::error::UserFriendlyError;

#[must_use]
pub fn clusterup_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[doc(hidden)]
pub use clusterup_utils::{error, exit_codes, logging, types};

#[doc(hidden)]
pub use clusterup_config as config;

#[doc(hidden)]
pub use clusterup_engine::{
    download, driver, handoff, infra, keys, orchestrator, platform, preflight, progress, render,
    retry, runner, tool,
};

// Exported with #[doc(hidden)] for white-box testing of flag parsing
#[doc(hidden)]
pub mod cli;
