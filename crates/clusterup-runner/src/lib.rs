//! Process execution for the external tools clusterup drives
//!
//! Terraform, the AWS CLI, `ssh-keygen` and `scp` are all invoked through
//! [`ProcessRunner`], so the provisioning workflow can be exercised against a
//! scripted fake in tests and against [`NativeRunner`] in production.
//!
//! # Security Model
//!
//! All process execution goes through [`CommandSpec`] to ensure argv-style invocation.
//! Credentials, key paths and repository names cross the process boundary as
//! discrete arguments, never as shell strings.

pub mod command_spec;
pub mod error;
pub mod native;
pub mod process;

pub use command_spec::{CommandSpec, OutputMode};
pub use error::RunnerError;
pub use native::NativeRunner;
pub use process::{ProcessOutput, ProcessRunner};
