//! Configuration management for clusterup
//!
//! Hierarchical configuration with discovery and precedence:
//! CLI > file > defaults. The TOML file has `[defaults]`, `[tools]`,
//! `[handoff]`, `[render]` and `[summary]` sections.

mod config;

pub use config::*;
