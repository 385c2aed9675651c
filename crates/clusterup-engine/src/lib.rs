//! Provisioning workflow for clusterup.
//!
//! Each module wraps one external collaborator or one step of the run; the
//! [`orchestrator`] sequences them.

pub use clusterup_config as config;
pub use clusterup_runner as runner;
pub use clusterup_utils::error;
pub use clusterup_utils::exit_codes;
pub use clusterup_utils::logging;
pub use clusterup_utils::types;

pub mod download;
pub mod driver;
pub mod handoff;
pub mod infra;
pub mod keys;
pub mod orchestrator;
pub mod platform;
pub mod preflight;
pub mod progress;
pub mod render;
pub mod retry;
pub mod tool;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use orchestrator::{Orchestrator, ProvisionRequest, RunReport};

/// Directory the infrastructure repository is normalised to.
pub const WORK_DIR_NAME: &str = "citc-terraform";
/// Private key file name inside the working directory.
pub const KEY_FILE_NAME: &str = "citc-key";
