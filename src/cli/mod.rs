//! Command-line interface for clusterup
//!
//! ## Module Structure
//!
//! - `args`: CLI argument definitions (clap)
//! - `run`: Main entry point, runtime setup and error output
//! - `tests`: Test module (cfg(test) only)

pub mod args;
mod run;


pub use args::{Cli, build_cli};

pub use run::{cli_args, provision_request, render_report, run};
